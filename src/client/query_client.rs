//! Query Client
//!
//! The handle consumers share: subscribes to keys, runs fetches on Tokio and
//! reacts to invalidation and host lifecycle events.

use std::any::TypeId;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::{
    AnyData, CacheEvent, CacheStats, CacheStore, ErasedFetcher, FetchPolicy, FetchTicket,
    ObserverId, QueryKey, QueryOptions, QueryResult,
};
use crate::client::subscription::to_result;
use crate::client::{LifecycleEvent, Subscription};
use crate::config::Config;
use crate::error::{FetchError, QueryError, Result};

// == Query Client ==
/// A cheaply cloneable handle to one query cache.
///
/// Construct one per application (or per test) and pass it to consumers.
/// Clones share the same cache.
///
/// Fetches run on the current Tokio runtime. Outside one, `subscribe` fails
/// with [`QueryError::NoRuntime`] when it would fetch, and the other
/// operations start no fetches.
#[derive(Clone)]
pub struct QueryClient {
    store: Arc<Mutex<CacheStore>>,
}

impl QueryClient {
    // == Constructors ==
    /// Creates a client with default capacity and garbage-collection time.
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Creates a client from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::with_store(CacheStore::new(
            config.max_entries,
            Duration::from_secs(config.gc_time),
        ))
    }

    pub fn with_store(store: CacheStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    // == Subscribe ==
    /// Registers a consumer of `key`, fetching with `fetcher` when needed.
    ///
    /// The key is validated before anything else. Keys that do not serialize
    /// to a non-empty JSON array fail with `InvalidKey` or `KeyTooLong`. A key
    /// already cached for another payload type fails with `TypeMismatch`.
    /// A subscription that must fetch outside a Tokio runtime fails with
    /// `NoRuntime` and is not registered.
    ///
    /// A fetch starts when the subscription is enabled and there is no data,
    /// or the data is stale and `refetch_on_mount` is set. A fetch already in
    /// flight for the key is joined instead of duplicated.
    ///
    /// # Example
    /// ```no_run
    /// # async fn demo() -> query_cache::error::Result<()> {
    /// use query_cache::{QueryClient, QueryOptions};
    ///
    /// let client = QueryClient::new();
    /// let mut posts = client.subscribe(
    ///     ["posts"],
    ///     |_key| async { Ok::<_, String>(vec!["first post".to_string()]) },
    ///     QueryOptions::default(),
    /// )?;
    /// let result = posts.settled().await;
    /// assert_eq!(result.data().map(Vec::len), Some(1));
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe<T, K, F, Fut, E>(
        &self,
        key: K,
        fetcher: F,
        options: QueryOptions,
    ) -> Result<Subscription<T>>
    where
        T: Send + Sync + 'static,
        K: Serialize,
        F: Fn(QueryKey) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: fmt::Display,
    {
        let key = QueryKey::new(key)?;

        let fetcher: ErasedFetcher = Arc::new(move |key: QueryKey| {
            let fetch = fetcher(key);
            async move {
                fetch
                    .await
                    .map(|data| Arc::new(data) as AnyData)
                    .map_err(|e| FetchError::new(e.to_string()))
            }
            .boxed()
        });
        let policy = FetchPolicy {
            fetcher,
            retry: options.retry,
            retry_delay: options.retry_delay,
        };

        let mut store = self.store.lock();
        let attached = store.attach::<T>(&key, Some(policy), options.clone())?;
        if attached.should_fetch {
            if let Err(e) = self.start_fetch(&mut store, &key) {
                store.detach(&key, attached.observer);
                return Err(e);
            }
        }
        drop(store);

        Ok(Subscription::new(
            self.clone(),
            key,
            attached.observer,
            options,
            attached.receiver,
        ))
    }

    /// Unsubscribes a consumer. Same as dropping the subscription.
    pub fn unsubscribe<T>(&self, subscription: Subscription<T>) {
        drop(subscription);
    }

    pub(crate) fn detach(&self, key: &QueryKey, observer: ObserverId) {
        self.store.lock().detach(key, observer);
    }

    // == Invalidate ==
    /// Marks every entry whose key matches `predicate` as stale.
    ///
    /// Entries with an enabled observer are refetched at once. The rest
    /// refetch on their next subscription. Returns the number matched.
    pub fn invalidate(&self, predicate: impl FnMut(&QueryKey) -> bool) -> usize {
        let mut store = self.store.lock();
        let (matched, refetch) = store.invalidate(predicate);
        let started = refetch
            .iter()
            .filter(|key| self.try_start_fetch(&mut store, key))
            .count();

        debug!(
            "invalidated {} entries, {} refetches started",
            matched, started
        );
        matched
    }

    /// Invalidates exactly `key`.
    pub fn invalidate_key(&self, key: &QueryKey) -> usize {
        self.invalidate(|k| k == key)
    }

    /// Invalidates `prefix` and every key extending it.
    pub fn invalidate_prefix(&self, prefix: &QueryKey) -> usize {
        self.invalidate(|k| k.starts_with(prefix))
    }

    // == Refetch ==
    /// Fetches `key` now, even if its data is fresh.
    ///
    /// Returns false if the key is unknown or a fetch is already running.
    pub fn refetch(&self, key: &QueryKey) -> bool {
        let mut store = self.store.lock();
        self.try_start_fetch(&mut store, key)
    }

    // == Lifecycle Events ==
    /// Refetches every entry that has an enabled observer which opted in to
    /// `event` and sees stale data. Returns the number of fetches started.
    pub fn handle_event(&self, event: LifecycleEvent) -> usize {
        let mut store = self.store.lock();
        let keys = store.stale_observed(|options| event.applies_to(options));
        let started = keys
            .iter()
            .filter(|key| self.try_start_fetch(&mut store, key))
            .count();

        debug!("{:?}: {} refetches started", event, started);
        started
    }

    pub fn focus_gained(&self) -> usize {
        self.handle_event(LifecycleEvent::FocusGained)
    }

    pub fn reconnected(&self) -> usize {
        self.handle_event(LifecycleEvent::Reconnected)
    }

    // == Removal ==
    /// Drops every entry and aborts every in-flight fetch.
    pub fn reset(&self) -> usize {
        let count = self.store.lock().clear();
        info!("Query cache reset: {} entries dropped", count);
        count
    }

    /// Deletes one entry now, even if it is observed.
    pub fn remove(&self, key: &QueryKey) -> bool {
        self.store.lock().remove(key)
    }

    /// Removes unobserved entries whose grace period has elapsed.
    pub fn collect_garbage(&self) -> usize {
        self.store.lock().collect_garbage()
    }

    // == Introspection ==
    /// The current state of `key` as seen by a consumer of type `T`.
    ///
    /// Returns None if the key is not cached or is cached as another type.
    pub fn query_result<T>(&self, key: &QueryKey) -> Option<QueryResult<T>>
    where
        T: Send + Sync + 'static,
    {
        let store = self.store.lock();
        let entry = store.get(key)?;
        if entry.type_id != TypeId::of::<T>() {
            return None;
        }
        Some(to_result(&entry.snapshot()))
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.store
            .lock()
            .get(key)
            .is_some_and(|entry| entry.is_fetching())
    }

    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.store
            .lock()
            .get(key)
            .map_or(0, |entry| entry.observer_count())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.store.lock().contains(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.store.lock().in_flight_count()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.lock().stats()
    }

    /// Subscribes to cache-wide change notifications.
    pub fn events(&self) -> broadcast::Receiver<CacheEvent> {
        self.store.lock().events()
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    // == Fetch Execution ==
    /// Starts a fetch for `key` unless one is already running.
    ///
    /// The task is spawned while the store lock is held and its abort handle
    /// is registered before the lock is released. So its completion, which
    /// needs the same lock, always finds its own registration. A panicking
    /// fetch function settles the fetch as a failure.
    fn start_fetch(&self, store: &mut CacheStore, key: &QueryKey) -> Result<bool> {
        let runtime =
            Handle::try_current().map_err(|_| QueryError::NoRuntime(key.to_string()))?;
        let Some(FetchTicket { key, id, policy }) = store.begin_fetch(key) else {
            return Ok(false);
        };

        let shared = Arc::clone(&self.store);
        let task_key = key.clone();
        let handle = runtime.spawn(async move {
            let outcome = AssertUnwindSafe(run_fetch(&policy, &task_key))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(FetchError::new("fetch panicked")));
            shared.lock().complete_fetch(&task_key, id, outcome);
        });

        store.register_abort(&key, id, handle.abort_handle());
        Ok(true)
    }

    /// Like `start_fetch`, logging instead of failing when there is no runtime.
    fn try_start_fetch(&self, store: &mut CacheStore, key: &QueryKey) -> bool {
        self.start_fetch(store, key).unwrap_or_else(|e| {
            warn!("{}", e);
            false
        })
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.lock();
        f.debug_struct("QueryClient")
            .field("entries", &store.len())
            .field("in_flight", &store.in_flight_count())
            .finish()
    }
}

/// Runs the fetch function, retrying failures as the policy allows.
async fn run_fetch(
    policy: &FetchPolicy,
    key: &QueryKey,
) -> std::result::Result<AnyData, FetchError> {
    let mut attempt = 0;
    loop {
        match (policy.fetcher)(key.clone()).await {
            Ok(data) => return Ok(data),
            Err(error) if attempt < policy.retry => {
                attempt += 1;
                debug!(
                    "{} attempt {} failed ({}), retrying in {:?}",
                    key, attempt, error, policy.retry_delay
                );
                tokio::time::sleep(policy.retry_delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}
