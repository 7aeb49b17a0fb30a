//! Lifecycle Events
//!
//! Host signals that can trigger refetches of stale queries.

use crate::cache::QueryOptions;

/// Host environment signals that may trigger refetches.
///
/// Mounting and unmounting are not listed: they are `subscribe` and dropping
/// the returned subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The window or application regained focus.
    FocusGained,
    /// Network connectivity was restored.
    Reconnected,
}

impl LifecycleEvent {
    /// Whether an observer with `options` opted in to refetching on this event.
    pub const fn applies_to(self, options: &QueryOptions) -> bool {
        match self {
            LifecycleEvent::FocusGained => options.refetch_on_focus,
            LifecycleEvent::Reconnected => options.refetch_on_reconnect,
        }
    }
}
