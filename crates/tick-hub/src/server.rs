//! HTTP server implementation using axum.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use tick_telemetry::Metrics;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::admission::{Admission, Seat};
use crate::config::HubConfig;
use crate::error::{HubError, HubResult};
use crate::hub::BroadcastHub;
use crate::types::HubStats;

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    hub: BroadcastHub,
    producers: Arc<Admission>,
    subscribers: Arc<Admission>,
    config: HubConfig,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(hub: BroadcastHub, config: HubConfig, shutdown: CancellationToken) -> Self {
        Self {
            hub,
            producers: Admission::producer(),
            subscribers: Admission::subscribers(config.max_subscribers),
            config,
            shutdown,
        }
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ingest", get(ingest_handler))
        .route("/data", get(subscribe_handler))
        .route("/api/stats", get(get_stats))
        .route("/metrics", get(get_metrics))
        .with_state(state)
}

/// Hub counters as JSON.
async fn get_stats(State(state): State<AppState>) -> Json<HubStats> {
    Json(state.hub.stats())
}

/// Prometheus text exposition.
async fn get_metrics() -> Response {
    match Metrics::gather_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Producer WebSocket upgrade. Only one producer at a time.
async fn ingest_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    match state.producers.admit() {
        Ok(seat) => ws.on_upgrade(move |socket| handle_producer(socket, state, seat)),
        Err(rejected) => rejected.into_response(),
    }
}

/// Subscriber WebSocket upgrade.
async fn subscribe_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    match state.subscribers.admit() {
        Ok(seat) => ws.on_upgrade(move |socket| handle_subscriber(socket, state, seat)),
        Err(rejected) => rejected.into_response(),
    }
}

/// Read producer messages and publish each one, in order.
async fn handle_producer(mut socket: WebSocket, state: AppState, _seat: Seat) {
    state.hub.producer_connected();
    let idle_timeout = state.config.producer_idle_timeout();

    let reason = loop {
        let next = tokio::select! {
            () = state.shutdown.cancelled() => break "hub shutdown",
            next = recv_with_timeout(&mut socket, idle_timeout) => next,
        };

        match next {
            Ok(Some(Ok(Message::Text(text)))) => {
                state.hub.publish(text.as_str());
            }
            Ok(Some(Ok(Message::Binary(data)))) => match std::str::from_utf8(&data) {
                Ok(text) => {
                    state.hub.publish(text);
                }
                Err(_) => warn!(len = data.len(), "Dropping non-UTF-8 producer frame"),
            },
            Ok(Some(Ok(Message::Close(frame)))) => {
                debug!(?frame, "Producer sent close frame");
                break "producer closed connection";
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                debug!(error = %e, "Producer receive error");
                break "producer connection error";
            }
            Ok(None) => break "producer stream ended",
            Err(()) => {
                warn!(timeout_ms = state.config.producer_idle_timeout_ms, "Producer idle timeout");
                break "producer idle timeout";
            }
        }
    };

    state.hub.producer_terminated(reason);
}

/// `Err(())` when the idle timeout elapsed.
async fn recv_with_timeout(
    socket: &mut WebSocket,
    idle_timeout: Option<std::time::Duration>,
) -> Result<Option<Result<Message, axum::Error>>, ()> {
    match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, socket.recv())
            .await
            .map_err(|_| ()),
        None => Ok(socket.recv().await),
    }
}

/// Forward queued payloads to one subscriber until either side goes away.
async fn handle_subscriber(socket: WebSocket, state: AppState, _seat: Seat) {
    let mut subscription = state.hub.subscribe();
    let id = subscription.id();
    info!(
        subscriber = %id,
        connections = state.subscribers.taken(),
        "New subscriber connection"
    );

    let (mut sender, mut receiver) = socket.split();

    // Subscribers never send data; watch for close so the registry entry goes
    // away as soon as the peer leaves.
    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Subscriber sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "Subscriber receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            payload = subscription.recv() => {
                let Some(payload) = payload else { break };
                if sender.send(Message::Text(payload.to_string().into())).await.is_err() {
                    debug!(subscriber = %id, "Failed to send message, subscriber disconnected");
                    break;
                }
            }
            _ = &mut incoming_task => {
                debug!(subscriber = %id, "Subscriber closed connection");
                break;
            }
            () = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    incoming_task.abort();
    drop(subscription);
    info!(
        subscriber = %id,
        subscribers = state.hub.subscriber_count(),
        "Subscriber connection closed"
    );
}

/// Bound hub server.
pub struct HubServer {
    listener: TcpListener,
    hub: BroadcastHub,
    config: HubConfig,
}

impl HubServer {
    /// Bind the listening socket.
    pub async fn bind(config: HubConfig) -> HubResult<Self> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| HubError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let hub = BroadcastHub::new(config.subscriber_queue_capacity);
        Ok(Self {
            listener,
            hub,
            config,
        })
    }

    pub fn local_addr(&self) -> HubResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the hub, e.g. for inspecting subscriber counts.
    pub fn hub(&self) -> BroadcastHub {
        self.hub.clone()
    }

    /// Serve until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> HubResult<()> {
        let addr = self.local_addr()?;
        let state = AppState::new(self.hub, self.config, shutdown.clone());
        let app = create_router(state);

        info!(%addr, "Starting hub server");
        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        info!("Hub server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = HubConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        };
        let server = HubServer::bind(config).await.unwrap();
        let addr = tokio_test::assert_ok!(server.local_addr());
        assert_ne!(addr.port(), 0);
        assert_eq!(server.hub().subscriber_count(), 0);
    }
}
