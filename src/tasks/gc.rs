//! Garbage Collection Task
//!
//! Background task that periodically removes unobserved cache entries whose
//! grace period has elapsed.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::QueryClient;

/// Spawns a background task that periodically collects unused entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between sweeps.
///
/// # Arguments
/// * `client` - The query client whose cache is swept
/// * `interval` - Time between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let client = QueryClient::new();
/// let gc_handle = spawn_gc_task(client.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// gc_handle.abort();
/// ```
pub fn spawn_gc_task(client: QueryClient, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting query GC task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = client.collect_garbage();
            if removed > 0 {
                info!("Query GC: removed {} unused entries", removed);
            } else {
                debug!("Query GC: nothing to collect");
            }
        }
    })
}
