//! feed-watch
//!
//! Loads the first page of the discussion feed, follows the realtime vote
//! channel and logs every cache change until interrupted.

use tokio::sync::{broadcast, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use farmforum_client::config::ClientConfig;
use farmforum_client::models::QueryArgs;
use farmforum_client::{CacheEvent, FeedPager, ForumClient, LoadOutcome, RealtimeChannel};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ClientConfig::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting feed-watch");
    tracing::info!("API base URL: {}", config.api_base_url);

    if config.api_token.is_none() {
        tracing::warn!("No API token configured (FARMFORUM_API_TOKEN). Requests are anonymous!");
    }

    let client = ForumClient::from_config(&config)?;
    let mut changes = client.subscribe_changes();

    let mut pager = FeedPager::posts(&client, QueryArgs::first_page(config.page_limit));
    match pager.load().await {
        LoadOutcome::Failed(err) => tracing::error!("Initial feed load failed: {}", err),
        _ => {
            let view = pager.view();
            tracing::info!(
                "Loaded {} posts ({} total, more: {})",
                view.items.len(),
                view.total_count,
                view.has_next_page
            );
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let realtime = match RealtimeChannel::from_config(&config) {
        Some(channel) => {
            tracing::info!("Realtime URL: {}", channel.url());
            Some(tokio::spawn(channel.run(client.clone(), shutdown_rx)))
        }
        None => {
            tracing::warn!("No realtime URL configured (FARMFORUM_REALTIME_URL). Votes will not sync!");
            None
        }
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = changes.recv() => match event {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Missed {} cache events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = realtime {
        handle.await?;
    }

    Ok(())
}

fn log_event(event: &CacheEvent) {
    match event {
        CacheEvent::Fetched(key) => tracing::info!("Fetched {}", key),
        CacheEvent::FetchFailed { key, error } => tracing::warn!("Fetch of {} failed: {}", key, error),
        CacheEvent::Reconciled { post_id, records } => {
            tracing::info!("Vote update for {} applied to {} records", post_id, records)
        }
        CacheEvent::MutationFailed { mutation, error } => {
            tracing::warn!("{:?} failed: {}", mutation, error)
        }
        other => tracing::debug!("{:?}", other),
    }
}
