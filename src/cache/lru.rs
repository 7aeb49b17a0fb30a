//! LRU Tracker Module
//!
//! Orders query keys by last subscription for capacity eviction.

use std::collections::VecDeque;

use crate::cache::QueryKey;

// == LRU Tracker ==
/// Tracks how recently each key was subscribed to.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently used
/// - Back = Least recently used
#[derive(Debug, Default)]
pub struct LruTracker {
    order: VecDeque<QueryKey>,
}

impl LruTracker {
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Touch ==
    /// Marks a key as recently used (moves to front).
    pub fn touch(&mut self, key: &QueryKey) {
        self.remove(key);
        self.order.push_front(key.clone());
    }

    // == Remove ==
    pub fn remove(&mut self, key: &QueryKey) {
        self.order.retain(|k| k != key);
    }

    // == Evict Oldest Matching ==
    /// Removes and returns the least recently used key accepted by `evictable`.
    ///
    /// Keys rejected by the predicate keep their position. Returns None if
    /// no tracked key qualifies.
    pub fn evict_oldest_where(
        &mut self,
        mut evictable: impl FnMut(&QueryKey) -> bool,
    ) -> Option<QueryKey> {
        let index = self.order.iter().rposition(|key| evictable(key))?;
        self.order.remove(index)
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[cfg(test)]
    fn peek_oldest(&self) -> Option<&QueryKey> {
        self.order.back()
    }
}
