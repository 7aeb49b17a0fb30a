//! Client Module
//!
//! The consumer-facing side of the cache: the shared [`QueryClient`], the
//! [`Subscription`] handles it hands out, and the host lifecycle events it
//! reacts to.

mod lifecycle;
mod query_client;
mod subscription;

pub use lifecycle::LifecycleEvent;
pub use query_client::QueryClient;
pub use subscription::Subscription;
