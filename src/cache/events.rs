//! Cache Events Module
//!
//! Cache-wide change notifications broadcast to any listener.

use crate::cache::QueryKey;

/// Cache-wide change notifications, for devtools-style observers.
///
/// Delivered over a bounded broadcast channel; slow receivers may lag and
/// miss events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// An entry was created by its first subscriber.
    Added(QueryKey),
    /// An entry's state, fetch status or freshness changed.
    Updated(QueryKey),
    /// An entry was removed, evicted or garbage collected.
    Removed(QueryKey),
    /// Every entry was dropped by a reset.
    Cleared,
}

/// Capacity of the cache event channel.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;
