//! Query Key Module
//!
//! Canonical, hashable identifiers for cached queries.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::cache::MAX_KEY_LENGTH;
use crate::error::{QueryError, Result};

// == Query Key ==
/// An ordered list of JSON parts identifying one logical query.
///
/// Equality and hashing use the canonical JSON text. Object members are
/// sorted by name, so `{"a":1,"b":2}` and `{"b":2,"a":1}` name the same key.
/// Numbers keep their JSON type: `1` and `1.0` are different keys.
#[derive(Clone)]
pub struct QueryKey {
    parts: Arc<[Value]>,
    canonical: Arc<str>,
}

impl QueryKey {
    // == Constructor ==
    /// Builds a key from any value that serializes to a non-empty JSON array.
    ///
    /// Tuples, arrays, slices and `Vec`s all qualify:
    ///
    /// ```
    /// use query_cache::QueryKey;
    /// use serde_json::json;
    ///
    /// let key = QueryKey::new(("posts", 1, json!({ "hello": " world!" }))).unwrap();
    /// assert_eq!(key.to_string(), r#"["posts",1,{"hello":" world!"}]"#);
    /// ```
    pub fn new<K: Serialize>(parts: K) -> Result<Self> {
        let value =
            serde_json::to_value(parts).map_err(|e| QueryError::InvalidKey(e.to_string()))?;

        let parts = match value {
            Value::Array(parts) if !parts.is_empty() => parts,
            Value::Array(_) => {
                return Err(QueryError::InvalidKey(
                    "query key must not be empty".to_string(),
                ))
            }
            other => {
                return Err(QueryError::InvalidKey(format!(
                    "query key must be an array, got {}",
                    other
                )))
            }
        };

        let canonical = serde_json::to_string(&parts)
            .map_err(|e| QueryError::InvalidKey(e.to_string()))?;

        if canonical.len() > MAX_KEY_LENGTH {
            return Err(QueryError::KeyTooLong {
                len: canonical.len(),
                max: MAX_KEY_LENGTH,
            });
        }

        Ok(Self {
            parts: parts.into(),
            canonical: canonical.into(),
        })
    }

    /// The individual key parts.
    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    /// The canonical JSON text used for equality.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    // == Prefix Match ==
    /// Returns true if `prefix`'s parts are a leading run of this key's parts.
    ///
    /// `["posts"]` matches `["posts"]` and `["posts", 1]` but not `["users"]`.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        prefix.parts.len() <= self.parts.len()
            && self
                .parts
                .iter()
                .zip(prefix.parts.iter())
                .all(|(a, b)| a == b)
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl fmt::Debug for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("QueryKey").field(&&*self.canonical).finish()
    }
}

// Serializes back to the parts array, so a key can be passed wherever
// `impl Serialize` is accepted and rebuilds to an equal key.
impl Serialize for QueryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.parts[..].serialize(serializer)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_key_from_slice() {
        let key = QueryKey::new(["posts"]).unwrap();
        assert_eq!(key.as_str(), r#"["posts"]"#);
        assert_eq!(key.parts().len(), 1);
    }

    #[test]
    fn test_key_from_tuple() {
        let key = QueryKey::new(("posts", 7, json!({ "hello": " world!" }))).unwrap();
        assert_eq!(key.parts()[1], json!(7));
        assert_eq!(key.to_string(), r#"["posts",7,{"hello":" world!"}]"#);
    }

    #[test]
    fn test_object_member_order_is_canonical() {
        let a = QueryKey::new(json!(["posts", { "page": 1, "sort": "asc" }])).unwrap();
        let b = QueryKey::new(json!(["posts", { "sort": "asc", "page": 1 }])).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_numeric_types_stay_distinct() {
        let int = QueryKey::new(json!(["posts", 1])).unwrap();
        let float = QueryKey::new(json!(["posts", 1.0])).unwrap();
        assert_ne!(int, float);
    }

    #[test]
    fn test_empty_key_rejected() {
        let parts: Vec<String> = Vec::new();
        let result = QueryKey::new(parts);
        assert!(matches!(result, Err(QueryError::InvalidKey(_))));
    }

    #[test]
    fn test_non_array_rejected() {
        let result = QueryKey::new("posts");
        assert!(matches!(result, Err(QueryError::InvalidKey(_))));
    }

    #[test]
    fn test_non_serializable_rejected() {
        // JSON objects need string keys
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple key");
        let result = QueryKey::new(vec![map]);
        assert!(matches!(result, Err(QueryError::InvalidKey(_))));
    }

    #[test]
    fn test_key_too_long() {
        let long = "x".repeat(MAX_KEY_LENGTH);
        let result = QueryKey::new([long]);
        assert!(matches!(result, Err(QueryError::KeyTooLong { .. })));
    }

    #[test]
    fn test_starts_with() {
        let posts = QueryKey::new(["posts"]).unwrap();
        let post = QueryKey::new(("posts", 1)).unwrap();
        let users = QueryKey::new(["users"]).unwrap();

        assert!(post.starts_with(&posts));
        assert!(posts.starts_with(&posts));
        assert!(!posts.starts_with(&post));
        assert!(!users.starts_with(&posts));
    }

    #[test]
    fn test_key_serializes_to_equal_key() {
        let key = QueryKey::new(("posts", 3)).unwrap();
        let rebuilt = QueryKey::new(&key).unwrap();
        assert_eq!(key, rebuilt);
    }
}
