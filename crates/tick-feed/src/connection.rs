//! Producer-side WebSocket connection to the hub.
//!
//! `HubLink` owns the socket and reconnects with exponential backoff.
//! Lines reach it through a bounded queue via `LinkHandle::try_send`, which
//! never waits: when the queue is full or the link is down the line is
//! dropped.

use crate::config::FeedConfig;
use crate::error::{FeedError, FeedResult};
use futures_util::{SinkExt, StreamExt};
use tick_core::ReconnectPolicy;
use tick_telemetry::Metrics;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// A line was not queued for the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    #[error("Hub link not connected")]
    Disconnected,

    #[error("Outbound queue full")]
    QueueFull,
}

impl EnqueueError {
    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::QueueFull => "queue_full",
        }
    }
}

/// How one connected session ended.
enum SessionEnd {
    /// Every `LinkHandle` is gone and the queue is flushed.
    Drained,
    Shutdown,
    StreamEnded,
}

/// Sending side of the link. Cheap to clone.
#[derive(Clone)]
pub struct LinkHandle {
    tx: mpsc::Sender<String>,
    state: watch::Receiver<LinkState>,
}

impl LinkHandle {
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Queue a payload for the hub without waiting.
    pub fn try_send(&self, payload: String) -> Result<(), EnqueueError> {
        if !self.is_connected() {
            return Err(EnqueueError::Disconnected);
        }
        self.tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Disconnected,
        })
    }

    /// Wait until the link is connected. `false` if the link stopped first.
    pub async fn wait_connected(&self) -> bool {
        let mut state = self.state.clone();
        let connected = state
            .wait_for(|s| *s == LinkState::Connected)
            .await
            .is_ok();
        connected
    }
}

/// Hub connection manager.
pub struct HubLink {
    url: String,
    policy: ReconnectPolicy,
    state: watch::Sender<LinkState>,
    outbound_rx: mpsc::Receiver<String>,
    attempt: u32,
    shutdown_token: CancellationToken,
}

impl HubLink {
    /// Create a link and its handle. Nothing connects until `run`.
    pub fn new(config: &FeedConfig, shutdown_token: CancellationToken) -> (Self, LinkHandle) {
        let (tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (state, state_rx) = watch::channel(LinkState::Disconnected);
        let link = Self {
            url: config.hub_url.clone(),
            policy: config.reconnect.clone(),
            state,
            outbound_rx,
            attempt: 0,
            shutdown_token,
        };
        let handle = LinkHandle {
            tx,
            state: state_rx,
        };
        (link, handle)
    }

    fn set_state(&self, state: LinkState) {
        self.state.send_replace(state);
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and forward queued payloads until every handle is dropped,
    /// shutdown is requested, or reconnection attempts run out.
    pub async fn run(mut self) -> FeedResult<()> {
        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting hub link");
                self.set_state(LinkState::Disconnected);
                return Ok(());
            }

            self.set_state(LinkState::Connecting);

            match self.try_connect().await {
                Ok(SessionEnd::Drained) => {
                    info!("Outbound queue closed, hub link finished");
                    self.set_state(LinkState::Disconnected);
                    return Ok(());
                }
                Ok(SessionEnd::Shutdown) => {
                    self.set_state(LinkState::Disconnected);
                    return Ok(());
                }
                Ok(SessionEnd::StreamEnded) => {
                    info!("Hub connection closed");
                }
                Err(e) => {
                    error!(error = %e, "Hub connection error");
                }
            }

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                self.set_state(LinkState::Disconnected);
                return Ok(());
            }

            self.attempt += 1;
            if self.policy.exhausted(self.attempt) {
                error!(attempt = self.attempt, "Max reconnection attempts reached");
                self.set_state(LinkState::Disconnected);
                return Err(FeedError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            self.set_state(LinkState::Reconnecting);
            Metrics::ws_reconnect("feed");

            let delay = self.policy.delay(self.attempt);
            warn!(
                attempt = self.attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to hub"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    self.set_state(LinkState::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&mut self) -> FeedResult<SessionEnd> {
        info!(url = %self.url, "Connecting to hub");

        let (ws_stream, _response) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        self.attempt = 0;
        self.set_state(LinkState::Connected);
        info!("Hub connected");

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, closing hub connection");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(error = %e, "Failed to send Close frame during shutdown");
                    }
                    return Ok(SessionEnd::Shutdown);
                }

                outbound = self.outbound_rx.recv() => {
                    match outbound {
                        Some(payload) => write.send(Message::Text(payload)).await?,
                        None => {
                            debug!("All link handles dropped, closing hub connection");
                            write.send(Message::Close(None)).await?;
                            return Ok(SessionEnd::Drained);
                        }
                    }
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "Hub closed the connection");
                            self.set_state(LinkState::Disconnected);
                            return Err(FeedError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            self.set_state(LinkState::Disconnected);
                            return Err(e.into());
                        }
                        None => {
                            warn!("Hub stream ended");
                            self.set_state(LinkState::Disconnected);
                            return Ok(SessionEnd::StreamEnded);
                        }
                        // The hub never sends data to producers.
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }
}
