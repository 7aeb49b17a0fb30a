//! Subscription Handle
//!
//! A consumer's live binding to one cache entry.

use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::cache::{
    is_stale, EntrySnapshot, ObserverId, QueryKey, QueryOptions, QueryResult, QueryState,
    QueryStatus,
};
use crate::client::QueryClient;
use crate::error::{FetchError, QueryError, Result};

// == Subscription ==
/// Keeps a consumer registered as an observer of one key.
///
/// Dropping the subscription unsubscribes. When the last observer of a key
/// leaves, the entry's garbage-collection grace period starts. Any fetch in
/// flight keeps running and still updates the cache.
pub struct Subscription<T> {
    client: QueryClient,
    key: QueryKey,
    observer: ObserverId,
    options: QueryOptions,
    receiver: watch::Receiver<EntrySnapshot>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Subscription<T>
where
    T: Send + Sync + 'static,
{
    pub(crate) fn new(
        client: QueryClient,
        key: QueryKey,
        observer: ObserverId,
        options: QueryOptions,
        receiver: watch::Receiver<EntrySnapshot>,
    ) -> Self {
        Self {
            client,
            key,
            observer,
            options,
            receiver,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    // == Current State ==
    /// The entry's latest published state.
    pub fn result(&self) -> QueryResult<T> {
        to_result(&self.receiver.borrow())
    }

    pub fn status(&self) -> QueryStatus {
        self.receiver.borrow().state.status()
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.result().state.data().cloned()
    }

    pub fn error(&self) -> Option<FetchError> {
        self.receiver.borrow().state.error().cloned()
    }

    pub fn is_fetching(&self) -> bool {
        self.receiver.borrow().is_fetching
    }

    /// Whether the data is stale under this subscription's `stale_after`.
    ///
    /// Recomputed on every call.
    pub fn is_stale(&self) -> bool {
        is_stale(
            self.receiver.borrow().fetched_at,
            self.options.stale_after,
            Instant::now(),
        )
    }

    // == Waiting ==
    /// Waits for the next state transition and returns the new state.
    ///
    /// Fails with [`QueryError::EntryRemoved`] once the entry has been
    /// removed, reset or garbage collected.
    pub async fn changed(&mut self) -> Result<QueryResult<T>> {
        if self.receiver.changed().await.is_err() {
            return Err(QueryError::EntryRemoved(self.key.to_string()));
        }
        Ok(self.result())
    }

    /// Waits until no fetch is in flight and returns the settled state.
    ///
    /// Returns at once if nothing is fetching. If the entry is removed while
    /// waiting, the last published state is returned.
    pub async fn settled(&mut self) -> QueryResult<T> {
        // Err means the sender is gone; fall through to the last value
        let _ = self.receiver.wait_for(|snapshot| !snapshot.is_fetching).await;
        self.result()
    }

    /// Forces a refetch of this key, deduplicated against any running fetch.
    pub fn refetch(&self) -> bool {
        self.client.refetch(&self.key)
    }

    /// Unsubscribes now. Same as dropping the handle.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.client.detach(&self.key, self.observer);
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("observer", &self.observer)
            .field("options", &self.options)
            .finish()
    }
}

// == Conversion ==
/// Downcasts a type-erased snapshot into a typed consumer view.
pub(crate) fn to_result<T>(snapshot: &EntrySnapshot) -> QueryResult<T>
where
    T: Send + Sync + 'static,
{
    let state = match &snapshot.state {
        QueryState::Pending => QueryState::Pending,
        QueryState::Error(error) => QueryState::Error(error.clone()),
        QueryState::Success {
            data,
            refetch_error,
        } => match Arc::clone(data).downcast::<T>() {
            Ok(data) => QueryState::Success {
                data,
                refetch_error: refetch_error.clone(),
            },
            // Payload types are checked on subscribe, so this is never reached
            Err(_) => QueryState::Pending,
        },
    };

    QueryResult {
        state,
        is_fetching: snapshot.is_fetching,
        updated_at: snapshot.updated_at,
    }
}
