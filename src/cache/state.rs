//! Query State Module
//!
//! The state machine of a single cache entry and the views handed to consumers.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::FetchError;

/// Coarse status of a query, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Success,
    Error,
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryStatus::Pending => "pending",
            QueryStatus::Success => "success",
            QueryStatus::Error => "error",
        };
        f.write_str(s)
    }
}

// == Query State ==
/// The state of a query entry.
///
/// `Success` always carries data and `Error` never does. A failed background
/// refetch over existing data stays `Success` and records the failure in
/// `refetch_error` instead of dropping what the consumer already shows.
#[derive(Debug, Clone)]
pub enum QueryState<T> {
    /// No data yet; the first fetch has not settled.
    Pending,
    /// Data is available.
    Success {
        data: T,
        /// Failure of the most recent background refetch, if any.
        refetch_error: Option<FetchError>,
    },
    /// The fetch failed and no data was ever fetched.
    Error(FetchError),
}

impl<T> QueryState<T> {
    pub const fn status(&self) -> QueryStatus {
        match self {
            QueryState::Pending => QueryStatus::Pending,
            QueryState::Success { .. } => QueryStatus::Success,
            QueryState::Error(_) => QueryStatus::Error,
        }
    }

    pub const fn data(&self) -> Option<&T> {
        match self {
            QueryState::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    /// The error of a failed query. `None` for `Success`, even after a failed refetch.
    pub const fn error(&self) -> Option<&FetchError> {
        match self {
            QueryState::Error(err) => Some(err),
            _ => None,
        }
    }

    pub const fn refetch_error(&self) -> Option<&FetchError> {
        match self {
            QueryState::Success { refetch_error, .. } => refetch_error.as_ref(),
            _ => None,
        }
    }

    pub const fn has_data(&self) -> bool {
        matches!(self, QueryState::Success { .. })
    }

    /// Converts the payload, keeping the state shape.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        match self {
            QueryState::Pending => QueryState::Pending,
            QueryState::Success {
                data,
                refetch_error,
            } => QueryState::Success {
                data: f(data),
                refetch_error,
            },
            QueryState::Error(err) => QueryState::Error(err),
        }
    }
}

// == Query Result ==
/// A consumer's read-only view of one entry.
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub state: QueryState<Arc<T>>,
    /// A fetch is in flight. Tracked apart from `state` so a background
    /// refetch keeps the previous data visible.
    pub is_fetching: bool,
    /// Wall-clock time of the last successful fetch.
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> QueryResult<T> {
    pub const fn status(&self) -> QueryStatus {
        self.state.status()
    }

    pub fn data(&self) -> Option<&T> {
        self.state.data().map(|data| data.as_ref())
    }

    pub const fn error(&self) -> Option<&FetchError> {
        self.state.error()
    }

    pub const fn refetch_error(&self) -> Option<&FetchError> {
        self.state.refetch_error()
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self.state, QueryState::Pending)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.state, QueryState::Success { .. })
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.state, QueryState::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(data: i32) -> QueryState<i32> {
        QueryState::Success {
            data,
            refetch_error: None,
        }
    }

    #[test]
    fn test_status() {
        assert_eq!(QueryState::<i32>::Pending.status(), QueryStatus::Pending);
        assert_eq!(success(1).status(), QueryStatus::Success);
        assert_eq!(
            QueryState::<i32>::Error(FetchError::new("boom")).status(),
            QueryStatus::Error
        );
    }

    #[test]
    fn test_success_has_data_and_no_error() {
        let state = success(42);
        assert_eq!(state.data(), Some(&42));
        assert!(state.error().is_none());
        assert!(state.has_data());
    }

    #[test]
    fn test_error_has_error_and_no_data() {
        let state: QueryState<i32> = QueryState::Error(FetchError::new("network down"));
        assert!(state.data().is_none());
        assert_eq!(state.error().map(FetchError::message), Some("network down"));
    }

    #[test]
    fn test_refetch_error_is_not_error() {
        let state = QueryState::Success {
            data: 1,
            refetch_error: Some(FetchError::new("timeout")),
        };
        assert!(state.error().is_none());
        assert_eq!(state.refetch_error().map(FetchError::message), Some("timeout"));
        assert_eq!(state.status(), QueryStatus::Success);
    }

    #[test]
    fn test_map_keeps_shape() {
        let mapped = success(2).map(|n| n.to_string());
        assert_eq!(mapped.data().map(String::as_str), Some("2"));

        let mapped = QueryState::<i32>::Pending.map(|n| n * 2);
        assert_eq!(mapped.status(), QueryStatus::Pending);
    }

    #[test]
    fn test_result_predicates() {
        let result = QueryResult {
            state: success(5).map(Arc::new),
            is_fetching: true,
            updated_at: None,
        };
        assert!(result.is_success());
        assert!(!result.is_pending());
        assert!(!result.is_error());
        assert_eq!(result.data(), Some(&5));
        assert!(result.is_fetching);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(QueryStatus::Pending.to_string(), "pending");
        assert_eq!(QueryStatus::Error.to_string(), "error");
    }
}
