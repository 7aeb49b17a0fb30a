//! Cache Statistics Module
//!
//! Tracks subscription hits and misses, fetch activity and evictions.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Subscriptions served fresh data without fetching
    pub hits: u64,
    /// Subscriptions that found no data or stale data
    pub misses: u64,
    /// Fetches actually started
    pub fetches: u64,
    /// Fetch requests folded into one already in flight
    pub deduplicated: u64,
    /// Fetches that settled with an error
    pub failures: u64,
    /// Entries dropped to stay under capacity
    pub evictions: u64,
    /// Unobserved entries removed after their grace period
    pub collected: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing subscribed yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_fetch(&mut self) {
        self.fetches += 1;
    }

    pub fn record_dedup(&mut self) {
        self.deduplicated += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_collected(&mut self, count: usize) {
        self.collected += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.fetches, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_fetch_counters() {
        let mut stats = CacheStats::new();
        stats.record_fetch();
        stats.record_dedup();
        stats.record_dedup();
        stats.record_failure();
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.deduplicated, 2);
        assert_eq!(stats.failures, 1);
    }

    #[test]
    fn test_removal_counters() {
        let mut stats = CacheStats::new();
        stats.record_eviction();
        stats.record_collected(3);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.collected, 3);
    }

    #[test]
    fn test_serializes_to_json() {
        let mut stats = CacheStats::new();
        stats.set_total_entries(2);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_entries"], 2);
        assert_eq!(json["hits"], 0);
    }
}
