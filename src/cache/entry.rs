//! Query Entry Module
//!
//! Defines the per-key cache record: state, observers, in-flight fetch and
//! the watch channel that carries snapshots to subscribers.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::cache::{QueryKey, QueryOptions, QueryState};
use crate::error::FetchError;

/// Type-erased payload shared between the entry and its subscribers.
pub(crate) type AnyData = Arc<dyn Any + Send + Sync>;

/// Type-erased fetch function registered by the latest subscriber.
pub(crate) type ErasedFetcher =
    Arc<dyn Fn(QueryKey) -> BoxFuture<'static, Result<AnyData, FetchError>> + Send + Sync>;

/// Identifies one subscriber of one entry.
pub type ObserverId = u64;

// == Snapshot ==
/// What subscribers see of an entry; republished on every transition.
#[derive(Clone)]
pub(crate) struct EntrySnapshot {
    pub state: QueryState<AnyData>,
    pub is_fetching: bool,
    pub fetched_at: Option<Instant>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The fetch currently running for an entry.
#[derive(Debug)]
pub(crate) struct InFlight {
    pub id: u64,
    pub abort: Option<AbortHandle>,
}

/// How the entry's fetch function is driven.
#[derive(Clone)]
pub(crate) struct FetchPolicy {
    pub fetcher: ErasedFetcher,
    pub retry: u32,
    pub retry_delay: Duration,
}

// == Freshness ==
/// Data fetched at `fetched_at` is stale once `stale_after` has elapsed.
///
/// `None` (never fetched, or invalidated) is always stale.
pub(crate) fn is_stale(fetched_at: Option<Instant>, stale_after: Duration, now: Instant) -> bool {
    match fetched_at {
        Some(fetched_at) => now.saturating_duration_since(fetched_at) >= stale_after,
        None => true,
    }
}

// == Query Entry ==
/// A single cached query.
pub struct QueryEntry {
    pub(crate) state: QueryState<AnyData>,
    /// Monotonic time of the last success; cleared by invalidation
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
    pub(crate) in_flight: Option<InFlight>,
    pub(crate) observers: HashMap<ObserverId, QueryOptions>,
    pub(crate) policy: Option<FetchPolicy>,
    /// Eviction deadline, set while the entry has no observers. Stays None
    /// for an unbounded grace period.
    pub(crate) gc_at: Option<Instant>,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    sender: watch::Sender<EntrySnapshot>,
}

impl QueryEntry {
    // == Constructor ==
    /// Creates an empty `Pending` entry for payloads of type `T`.
    pub(crate) fn new<T: Any>() -> Self {
        let state = QueryState::Pending;
        let (sender, _) = watch::channel(EntrySnapshot {
            state: state.clone(),
            is_fetching: false,
            fetched_at: None,
            updated_at: None,
        });

        Self {
            state,
            fetched_at: None,
            updated_at: None,
            in_flight: None,
            observers: HashMap::new(),
            policy: None,
            gc_at: None,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            sender,
        }
    }

    /// Returns true if the data is older than `stale_after` as of `now`.
    pub fn is_stale_at(&self, stale_after: Duration, now: Instant) -> bool {
        is_stale(self.fetched_at, stale_after, now)
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// True if at least one observer may trigger fetches.
    pub fn is_active(&self) -> bool {
        self.observers.values().any(|options| options.enabled)
    }

    pub fn status(&self) -> crate::cache::QueryStatus {
        self.state.status()
    }

    // == Observers ==
    pub(crate) fn receiver(&self) -> watch::Receiver<EntrySnapshot> {
        self.sender.subscribe()
    }

    pub(crate) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            state: self.state.clone(),
            is_fetching: self.is_fetching(),
            fetched_at: self.fetched_at,
            updated_at: self.updated_at,
        }
    }

    /// Pushes the current state to every subscriber.
    pub(crate) fn publish(&self) {
        self.sender.send_replace(self.snapshot());
    }

    // == Fetch Transitions ==
    /// Records the start of fetch `id`.
    ///
    /// An entry without data drops back to `Pending`, discarding any previous
    /// error. An entry with data keeps showing it.
    pub(crate) fn start_fetch(&mut self, id: u64) {
        if !self.state.has_data() {
            self.state = QueryState::Pending;
        }
        self.in_flight = Some(InFlight { id, abort: None });
        self.publish();
    }

    /// Applies a successful fetch.
    pub(crate) fn succeed(&mut self, data: AnyData, now: Instant) {
        self.state = QueryState::Success {
            data,
            refetch_error: None,
        };
        self.fetched_at = Some(now);
        self.updated_at = Some(Utc::now());
        self.in_flight = None;
        self.publish();
    }

    /// Applies a failed fetch, keeping previous data if there is any.
    pub(crate) fn fail(&mut self, error: FetchError) {
        self.state = match std::mem::replace(&mut self.state, QueryState::Pending) {
            QueryState::Success { data, .. } => QueryState::Success {
                data,
                refetch_error: Some(error),
            },
            _ => QueryState::Error(error),
        };
        self.in_flight = None;
        self.publish();
    }

    /// Expires the data and clears any attached refetch error.
    pub(crate) fn invalidate(&mut self) {
        self.fetched_at = None;
        if let QueryState::Success { refetch_error, .. } = &mut self.state {
            *refetch_error = None;
        }
        self.publish();
    }

    /// Aborts the running fetch, if any.
    pub(crate) fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            if let Some(abort) = in_flight.abort {
                abort.abort();
            }
        }
    }
}
