//! Subcommand runners.

use crate::config::AppConfig;
use crate::error::AppResult;
use tick_feed::FeedRelay;
use tick_hub::HubServer;
use tick_viewer::{run_viewer, TerminalSink};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Token cancelled on ctrl-c.
pub fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for ctrl-c, shutting down"),
        }
        signal_token.cancel();
    });
    token
}

/// Serve the hub until shutdown.
pub async fn run_hub(config: &AppConfig, shutdown: CancellationToken) -> AppResult<()> {
    let server = HubServer::bind(config.hub.clone()).await?;
    info!(
        addr = %server.local_addr()?,
        max_subscribers = config.hub.max_subscribers,
        queue_capacity = config.hub.subscriber_queue_capacity,
        "Hub listening"
    );
    server.run(shutdown).await?;
    Ok(())
}

/// Relay the producer into the hub until it exits or shutdown.
pub async fn run_feed(config: &AppConfig, shutdown: CancellationToken) -> AppResult<()> {
    // The relay logs its own line counts.
    FeedRelay::new(config.feed.clone()).run(shutdown).await?;
    Ok(())
}

/// Render the option chain in the terminal until shutdown.
pub async fn run_watch(config: &AppConfig, shutdown: CancellationToken) -> AppResult<()> {
    let mut sink = TerminalSink::stdout(&config.viewer);
    let consumer = run_viewer(&config.viewer, &mut sink, shutdown).await?;
    info!(
        accepted = consumer.accepted(),
        rejected = consumer.rejected(),
        "Viewer finished"
    );
    Ok(())
}
