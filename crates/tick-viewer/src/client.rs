//! Hub subscriber connection.
//!
//! Every text frame goes to the `StreamConsumer`; the sink is redrawn at most
//! once per `render_interval_ms` while updates arrive. Reconnecting keeps the
//! model as it is. The hub sends no history, so whatever was published while
//! disconnected is simply never seen.

use crate::config::ViewerConfig;
use crate::consumer::StreamConsumer;
use crate::error::{ViewerError, ViewerResult};
use crate::render::RenderSink;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tick_telemetry::Metrics;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

enum SessionEnd {
    Shutdown,
    Closed,
}

/// Subscribe to the hub and feed the consumer until shutdown, or until the
/// connection is lost and reconnection is disabled or exhausted.
///
/// Returns the closed consumer with its final model.
pub async fn run_viewer<S: RenderSink>(
    config: &ViewerConfig,
    sink: &mut S,
    shutdown: CancellationToken,
) -> ViewerResult<StreamConsumer> {
    let mut consumer = StreamConsumer::new(config.capacity);
    let mut attempt = 0u32;

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let result = run_session(config, &mut consumer, sink, &shutdown, &mut attempt).await;
        sink.connection_changed(false);

        match result {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Closed) => info!("Hub connection closed"),
            Err(e) if !config.reconnect => {
                consumer.on_close();
                return Err(e);
            }
            Err(e) => error!(error = %e, "Hub connection error"),
        }

        if !config.reconnect || shutdown.is_cancelled() {
            break;
        }

        attempt += 1;
        if config.policy.exhausted(attempt) {
            error!(attempt, "Max reconnection attempts reached");
            consumer.on_close();
            return Err(ViewerError::ConnectionFailed(
                "Max reconnection attempts reached".to_string(),
            ));
        }
        Metrics::ws_reconnect("viewer");

        let delay = config.policy.delay(attempt);
        warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting to hub");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = shutdown.cancelled() => break,
        }
    }

    consumer.on_close();
    sink.render(consumer.model());
    Ok(consumer)
}

async fn run_session<S: RenderSink>(
    config: &ViewerConfig,
    consumer: &mut StreamConsumer,
    sink: &mut S,
    shutdown: &CancellationToken,
    attempt: &mut u32,
) -> ViewerResult<SessionEnd> {
    info!(url = %config.hub_url, "Connecting to hub");
    let (ws_stream, _response) = connect_async(config.hub_url.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    *attempt = 0;
    sink.connection_changed(true);
    info!("Hub connected");

    let interval = Duration::from_millis(config.render_interval_ms.max(1));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut dirty = true;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    warn!(error = %e, "Failed to send Close frame during shutdown");
                }
                return Ok(SessionEnd::Shutdown);
            }

            _ = ticker.tick() => {
                if dirty {
                    sink.render(consumer.model());
                    dirty = false;
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        // Invalid records are logged by the consumer.
                        if consumer.on_message(&text).is_ok() {
                            dirty = true;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.to_string()))
                            .unwrap_or((1000, "Normal close".to_string()));
                        warn!(code, %reason, "Hub closed the connection");
                        return Ok(SessionEnd::Closed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(SessionEnd::Closed),
                }
            }
        }
    }
}
