//! Query Cache - An async data-fetching cache
//!
//! Caches the results of keyed fetch functions, deduplicates concurrent
//! requests, tracks staleness and refetches on invalidation or host
//! lifecycle events.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use cache::{
    CacheEvent, CacheStats, CacheStore, QueryKey, QueryOptions, QueryResult, QueryState,
    QueryStatus,
};
pub use client::{LifecycleEvent, QueryClient, Subscription};
pub use config::Config;
pub use error::{FetchError, QueryError};
pub use tasks::spawn_gc_task;
