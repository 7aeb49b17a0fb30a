//! Post model
//!
//! The resource served by the demo's posts API.

use serde::{Deserialize, Serialize};

/// A single post as returned by `/posts` and `/posts/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: u64,
    #[serde(default)]
    pub user_id: u64,
    pub title: String,
    pub body: String,
}
