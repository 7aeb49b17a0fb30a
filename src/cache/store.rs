//! Cache Store Module
//!
//! The synchronous state machine behind the query client: entry lifecycle,
//! fetch bookkeeping, invalidation, eviction and garbage collection.
//!
//! Nothing here spawns or awaits. The client holds the store behind a lock,
//! asks it which fetches to start, runs them, and reports each outcome back.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::entry::{AnyData, EntrySnapshot, FetchPolicy, ObserverId};
use crate::cache::events::EVENT_CHANNEL_CAPACITY;
use crate::cache::{
    CacheEvent, CacheStats, LruTracker, QueryEntry, QueryKey, QueryOptions,
};
use crate::error::{FetchError, QueryError, Result};

/// Result of registering an observer on an entry.
pub(crate) struct Attached {
    pub observer: ObserverId,
    pub receiver: watch::Receiver<EntrySnapshot>,
    pub should_fetch: bool,
}

/// Permission to run one fetch for one key.
pub(crate) struct FetchTicket {
    pub key: QueryKey,
    pub id: u64,
    pub policy: FetchPolicy,
}

// == Cache Store ==
/// All query entries, keyed by canonical query key.
pub struct CacheStore {
    entries: HashMap<QueryKey, QueryEntry>,
    /// Subscription recency, for capacity eviction
    lru: LruTracker,
    stats: CacheStats,
    /// Soft capacity; observed or fetching entries are never evicted
    max_entries: usize,
    /// Grace period before an unobserved entry may be collected
    gc_time: Duration,
    next_fetch_id: u64,
    next_observer_id: ObserverId,
    events: broadcast::Sender<CacheEvent>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// # Arguments
    /// * `max_entries` - Entry count above which idle entries are evicted
    /// * `gc_time` - How long an unobserved entry is kept
    pub fn new(max_entries: usize, gc_time: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            max_entries,
            gc_time,
            next_fetch_id: 0,
            next_observer_id: 0,
            events,
        }
    }

    // == Attach ==
    /// Registers an observer of `key`, creating the entry if absent.
    ///
    /// The entry's fetch policy is replaced by `policy` when one is given.
    /// `should_fetch` is set when the observer is enabled and there is no
    /// data, or there is stale data and the observer refetches on mount.
    pub(crate) fn attach<T: Any>(
        &mut self,
        key: &QueryKey,
        policy: Option<FetchPolicy>,
        options: QueryOptions,
    ) -> Result<Attached> {
        if let Some(entry) = self.entries.get(key) {
            if entry.type_id != TypeId::of::<T>() {
                return Err(QueryError::TypeMismatch {
                    key: key.to_string(),
                    cached: entry.type_name,
                    requested: std::any::type_name::<T>(),
                });
            }
        } else {
            self.make_room();
            self.entries.insert(key.clone(), QueryEntry::new::<T>());
            self.emit(CacheEvent::Added(key.clone()));
        }

        let observer = self.next_observer_id;
        self.next_observer_id += 1;

        let now = Instant::now();
        let Some(entry) = self.entries.get_mut(key) else {
            return Err(QueryError::EntryRemoved(key.to_string()));
        };

        if let Some(policy) = policy {
            entry.policy = Some(policy);
        }
        entry.gc_at = None;

        let has_data = entry.state.has_data();
        let stale = entry.is_stale_at(options.stale_after, now);
        let should_fetch = options.enabled && (!has_data || (options.refetch_on_mount && stale));
        entry.observers.insert(observer, options);
        let receiver = entry.receiver();

        if has_data && !stale {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        self.lru.touch(key);
        self.stats.set_total_entries(self.entries.len());

        Ok(Attached {
            observer,
            receiver,
            should_fetch,
        })
    }

    // == Detach ==
    /// Removes an observer. The last one out starts the entry's grace period.
    ///
    /// Returns false if the entry or observer no longer exists.
    pub(crate) fn detach(&mut self, key: &QueryKey, observer: ObserverId) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.observers.remove(&observer).is_none() {
            return false;
        }
        if entry.observers.is_empty() {
            // No deadline means the entry is never collected
            entry.gc_at = Instant::now().checked_add(self.gc_time);
            match entry.gc_at {
                Some(_) => debug!("{} unobserved, collectable in {:?}", key, self.gc_time),
                None => debug!("{} unobserved, retained indefinitely", key),
            }
        }
        true
    }

    // == Begin Fetch ==
    /// Marks `key` as fetching and hands out a ticket for the fetch.
    ///
    /// Returns None if a fetch is already in flight (the caller attaches to
    /// it), the entry is gone, or no fetch function is registered.
    pub(crate) fn begin_fetch(&mut self, key: &QueryKey) -> Option<FetchTicket> {
        let entry = self.entries.get_mut(key)?;

        if entry.is_fetching() {
            self.stats.record_dedup();
            debug!("{} already fetching, request deduplicated", key);
            return None;
        }
        let policy = entry.policy.clone()?;

        let id = self.next_fetch_id;
        self.next_fetch_id += 1;
        entry.start_fetch(id);

        self.stats.record_fetch();
        debug!("{} fetch #{} started", key, id);
        self.emit(CacheEvent::Updated(key.clone()));

        Some(FetchTicket {
            key: key.clone(),
            id,
            policy,
        })
    }

    /// Stores the abort handle of the task running fetch `id`.
    pub(crate) fn register_abort(&mut self, key: &QueryKey, id: u64, handle: AbortHandle) {
        match self
            .entries
            .get_mut(key)
            .and_then(|entry| entry.in_flight.as_mut())
        {
            Some(in_flight) if in_flight.id == id => in_flight.abort = Some(handle),
            _ => handle.abort(),
        }
    }

    // == Complete Fetch ==
    /// Applies the outcome of fetch `id`.
    ///
    /// Outcomes for entries that were removed, reset or re-fetched since the
    /// ticket was issued are dropped and false is returned.
    pub(crate) fn complete_fetch(
        &mut self,
        key: &QueryKey,
        id: u64,
        outcome: std::result::Result<AnyData, FetchError>,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            debug!("{} removed before fetch #{} settled, result dropped", key, id);
            return false;
        };
        if entry.in_flight.as_ref().map(|f| f.id) != Some(id) {
            debug!("{} fetch #{} superseded, result dropped", key, id);
            return false;
        }

        match outcome {
            Ok(data) => {
                entry.succeed(data, Instant::now());
                debug!("{} fetch #{} succeeded", key, id);
            }
            Err(error) => {
                warn!("{} fetch #{} failed: {}", key, id, error);
                entry.fail(error);
                self.stats.record_failure();
            }
        }
        self.emit(CacheEvent::Updated(key.clone()));
        true
    }

    // == Invalidate ==
    /// Expires every entry whose key matches `predicate`.
    ///
    /// Returns the number of matched entries and the keys that should be
    /// refetched because they have an enabled observer.
    pub fn invalidate(
        &mut self,
        mut predicate: impl FnMut(&QueryKey) -> bool,
    ) -> (usize, Vec<QueryKey>) {
        let mut matched = 0;
        let mut refetch = Vec::new();
        let mut touched = Vec::new();

        for (key, entry) in self.entries.iter_mut() {
            if !predicate(key) {
                continue;
            }
            matched += 1;
            entry.invalidate();
            if entry.is_active() {
                refetch.push(key.clone());
            }
            touched.push(key.clone());
        }

        for key in touched {
            self.emit(CacheEvent::Updated(key));
        }
        (matched, refetch)
    }

    // == Stale Observed ==
    /// Keys with an enabled observer that opted in via `trigger` and sees
    /// stale data under its own `stale_after`.
    pub fn stale_observed(&self, trigger: impl Fn(&QueryOptions) -> bool) -> Vec<QueryKey> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|(_, entry)| {
                entry.observers.values().any(|options| {
                    options.enabled
                        && trigger(options)
                        && entry.is_stale_at(options.stale_after, now)
                })
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    // == Remove ==
    /// Deletes an entry regardless of observers, aborting its fetch.
    pub fn remove(&mut self, key: &QueryKey) -> bool {
        match self.entries.remove(key) {
            Some(mut entry) => {
                entry.cancel();
                self.lru.remove(key);
                self.stats.set_total_entries(self.entries.len());
                self.emit(CacheEvent::Removed(key.clone()));
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Drops every entry and aborts every in-flight fetch.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        for entry in self.entries.values_mut() {
            entry.cancel();
        }
        self.entries.clear();
        self.lru.clear();
        self.stats.set_total_entries(0);
        self.emit(CacheEvent::Cleared);
        count
    }

    // == Garbage Collection ==
    /// Removes unobserved, idle entries whose grace period has elapsed.
    ///
    /// An entry with a fetch in flight is kept until a later sweep.
    pub fn collect_garbage(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<QueryKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry.observers.is_empty()
                    && !entry.is_fetching()
                    && entry.gc_at.is_some_and(|deadline| now >= deadline)
            })
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired.len();
        for key in expired {
            self.entries.remove(&key);
            self.lru.remove(&key);
            self.emit(CacheEvent::Removed(key));
        }

        self.stats.record_collected(count);
        self.stats.set_total_entries(self.entries.len());
        count
    }

    /// Evicts least recently used idle entries until there is room for one more.
    fn make_room(&mut self) {
        while self.entries.len() >= self.max_entries {
            let entries = &self.entries;
            let evicted = self.lru.evict_oldest_where(|key| {
                entries
                    .get(key)
                    .is_some_and(|entry| entry.observers.is_empty() && !entry.is_fetching())
            });

            match evicted {
                Some(key) => {
                    self.entries.remove(&key);
                    self.stats.record_eviction();
                    debug!("{} evicted to stay under {} entries", key, self.max_entries);
                    self.emit(CacheEvent::Removed(key));
                }
                None => {
                    debug!(
                        "cache over capacity ({} entries) with nothing evictable",
                        self.entries.len()
                    );
                    break;
                }
            }
        }
    }

    fn emit(&self, event: CacheEvent) {
        // Err only means nobody is listening
        let _ = self.events.send(event);
    }

    // == Accessors ==
    pub fn get(&self, key: &QueryKey) -> Option<&QueryEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.entries.keys()
    }

    /// Number of fetches currently in flight across all keys.
    pub fn in_flight_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_fetching()).count()
    }

    pub fn events(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
