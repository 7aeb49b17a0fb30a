//! Query Cache demo
//!
//! Subscribes to a post list and a single post from a JSON posts API, logs
//! their state transitions, then simulates a focus event.

use std::time::Duration;

use serde_json::json;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use query_cache::api::PostsApi;
use query_cache::models::Post;
use query_cache::{spawn_gc_task, Config, QueryClient, QueryOptions, QueryResult, Subscription};

/// Main entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the query client and start garbage collection
/// 4. Subscribe to the posts list and one post
/// 5. Simulate a focus event and log any refetch
/// 6. Wait for SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "query_cache=info", can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "query_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting query cache demo");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, gc_time={}s, stale_after={}ms, api={}",
        config.max_entries, config.gc_time, config.stale_after_ms, config.api_base_url
    );

    let client = QueryClient::from_config(&config);
    let gc_handle = spawn_gc_task(client.clone(), Duration::from_secs(config.cleanup_interval));

    tokio::select! {
        result = run_demo(&client, &config) => {
            if let Err(e) = result {
                error!("Demo failed: {}", e);
            }
        }
        _ = shutdown_signal() => {}
    }

    gc_handle.abort();
    warn!("Garbage collection task aborted");
    info!("Demo finished: {:?}", client.stats());
    Ok(())
}

async fn run_demo(client: &QueryClient, config: &Config) -> anyhow::Result<()> {
    let api = PostsApi::new(config.api_base_url.clone());
    let options = QueryOptions::default().stale_after(config.stale_after());

    let list_api = api.clone();
    let mut posts: Subscription<Vec<Post>> = client.subscribe(
        ["posts"],
        move |_key| {
            let api = list_api.clone();
            async move { api.fetch_posts().await }
        },
        options.clone(),
    )?;

    let post_id = config.post_id;
    let mut post: Subscription<Post> = client.subscribe(
        ("posts", post_id, json!({ "hello": " world!" })),
        move |key| {
            let api = api.clone();
            async move {
                info!("Fetching {}", key);
                api.fetch_post(post_id).await
            }
        },
        options,
    )?;

    log_posts(&posts.result());
    log_post(&post.result());

    log_posts(&posts.settled().await);
    log_post(&post.settled().await);

    let started = client.focus_gained();
    info!("Focus gained: {} refetches started", started);
    if started > 0 {
        log_posts(&posts.settled().await);
        log_post(&post.settled().await);
    }

    info!("Demo complete, press Ctrl+C to exit");
    std::future::pending::<()>().await;
    Ok(())
}

fn log_posts(result: &QueryResult<Vec<Post>>) {
    if let Some(posts) = result.data() {
        info!("[posts] {} posts loaded", posts.len());
    } else if let Some(e) = result.error() {
        warn!("[posts] Error: {}", e);
    } else {
        info!("[posts] Loading...");
    }
}

fn log_post(result: &QueryResult<Post>) {
    if let Some(post) = result.data() {
        info!(
            "[post {}] {} chars of title, {} chars of body",
            post.id,
            post.title.len(),
            post.body.len()
        );
    } else if let Some(e) = result.error() {
        warn!("[post] Error: {}", e);
    } else {
        info!("[post] Loading...");
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
