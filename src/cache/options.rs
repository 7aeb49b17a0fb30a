//! Query Options Module
//!
//! Per-subscription fetch and refetch behavior.

use std::time::Duration;

/// Per-subscription behavior of a query.
///
/// Each observer of a key keeps its own options. Refetch triggers look at
/// every enabled observer, so one observer opting in is enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// How long data stays fresh after a successful fetch.
    ///
    /// Zero means the data is stale as soon as it arrives.
    pub stale_after: Duration,

    /// Refetch stale data when the host regains focus.
    pub refetch_on_focus: bool,

    /// Refetch stale data when a consumer subscribes.
    pub refetch_on_mount: bool,

    /// Refetch stale data when network connectivity returns.
    pub refetch_on_reconnect: bool,

    /// Disabled observers never trigger a fetch on their own.
    pub enabled: bool,

    /// Extra attempts after a failed fetch. Zero disables retrying.
    pub retry: u32,

    /// Pause between retry attempts.
    pub retry_delay: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_after: Duration::ZERO,
            refetch_on_focus: true,
            refetch_on_mount: true,
            refetch_on_reconnect: true,
            enabled: true,
            retry: 0,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl QueryOptions {
    #[must_use]
    pub const fn stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    #[must_use]
    pub const fn refetch_on_focus(mut self, enabled: bool) -> Self {
        self.refetch_on_focus = enabled;
        self
    }

    #[must_use]
    pub const fn refetch_on_mount(mut self, enabled: bool) -> Self {
        self.refetch_on_mount = enabled;
        self
    }

    #[must_use]
    pub const fn refetch_on_reconnect(mut self, enabled: bool) -> Self {
        self.refetch_on_reconnect = enabled;
        self
    }

    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Retries a failed fetch up to `attempts` times, `delay` apart.
    #[must_use]
    pub const fn retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry = attempts;
        self.retry_delay = delay;
        self
    }
}
