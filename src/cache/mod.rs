//! Cache Module
//!
//! Keyed query entries with request deduplication, staleness windows and
//! garbage collection of unobserved entries.

mod entry;
mod events;
mod key;
mod lru;
mod options;
mod state;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{ObserverId, QueryEntry};
pub use events::CacheEvent;
pub use key::QueryKey;
pub use lru::LruTracker;
pub use options::QueryOptions;
pub use state::{QueryResult, QueryState, QueryStatus};
pub use stats::CacheStats;
pub use store::CacheStore;

pub(crate) use entry::{is_stale, AnyData, EntrySnapshot, ErasedFetcher, FetchPolicy};
pub(crate) use store::FetchTicket;

// == Public Constants ==
/// Maximum canonical query key length in bytes
pub const MAX_KEY_LENGTH: usize = 4096;
