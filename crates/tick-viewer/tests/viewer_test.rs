//! Viewer against a real hub.

use futures_util::SinkExt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tick_core::{ReconnectPolicy, Record};
use tick_hub::{BroadcastHub, HubConfig, HubServer};
use tick_viewer::{run_viewer, RenderSink, ViewModel, ViewerConfig, ViewerError};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::assert_err;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Seen {
    renders: Vec<Vec<String>>,
    connected: bool,
}

#[derive(Clone, Default)]
struct RecordingSink(Arc<Mutex<Seen>>);

impl RecordingSink {
    fn last_symbols(&self) -> Vec<String> {
        self.0.lock().unwrap().renders.last().cloned().unwrap_or_default()
    }

    fn connected(&self) -> bool {
        self.0.lock().unwrap().connected
    }
}

impl RenderSink for RecordingSink {
    fn render(&mut self, model: &ViewModel) {
        let symbols = model
            .iter()
            .filter_map(Record::symbol)
            .map(str::to_string)
            .collect();
        self.0.lock().unwrap().renders.push(symbols);
    }

    fn connection_changed(&mut self, connected: bool) {
        self.0.lock().unwrap().connected = connected;
    }
}

struct RunningHub {
    addr: SocketAddr,
    hub: BroadcastHub,
    token: CancellationToken,
    task: JoinHandle<()>,
}

async fn start_hub(port: u16) -> RunningHub {
    let config = HubConfig {
        bind_address: "127.0.0.1".to_string(),
        port,
        ..Default::default()
    };
    // The previous listener on a fixed port may take a moment to go away.
    let mut server = None;
    for _ in 0..50 {
        match HubServer::bind(config.clone()).await {
            Ok(s) => {
                server = Some(s);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    let server = server.expect("hub did not bind");
    let addr = server.local_addr().unwrap();
    let hub = server.hub();
    let token = CancellationToken::new();
    let run_token = token.clone();
    let task = tokio::spawn(async move {
        let _ = server.run(run_token).await;
    });
    RunningHub {
        addr,
        hub,
        token,
        task,
    }
}

impl RunningHub {
    async fn stop(self) {
        self.token.cancel();
        let _ = timeout(Duration::from_secs(5), self.task).await;
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(3), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached within timeout");
}

fn viewer_config(addr: SocketAddr, reconnect: bool) -> ViewerConfig {
    ViewerConfig {
        hub_url: format!("ws://{addr}/data"),
        capacity: 3,
        reconnect,
        policy: ReconnectPolicy {
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: 20,
            reconnect_max_delay_ms: 100,
        },
        render_interval_ms: 10,
        ..Default::default()
    }
}

fn tick(symbol: &str, ltp: f64) -> Message {
    Message::Text(format!(r#"{{"symbol":"{symbol}","LTP":{ltp}}}"#))
}

#[tokio::test]
async fn test_viewer_keeps_newest_records() {
    let hub = start_hub(0).await;
    let sink = RecordingSink::default();
    let config = viewer_config(hub.addr, false);
    let shutdown = CancellationToken::new();

    let viewer = {
        let mut sink = sink.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { run_viewer(&config, &mut sink, shutdown).await })
    };
    wait_for(|| hub.hub.subscriber_count() == 1).await;

    let (mut producer, _) = connect_async(format!("ws://{}/ingest", hub.addr))
        .await
        .unwrap();
    producer
        .send(Message::Text("not json".to_string()))
        .await
        .unwrap();
    for (i, symbol) in ["S1CE", "S2CE", "S3CE", "S4CE"].iter().enumerate() {
        producer.send(tick(symbol, i as f64)).await.unwrap();
    }

    wait_for(|| sink.last_symbols() == ["S4CE", "S3CE", "S2CE"]).await;
    assert!(sink.connected());

    shutdown.cancel();
    let consumer = timeout(Duration::from_secs(3), viewer)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(consumer.is_closed());
    assert_eq!(consumer.accepted(), 4);
    assert_eq!(consumer.model().len(), 3);
    assert_eq!(consumer.model().evicted(), 1);
    assert_eq!(consumer.rejected(), 1);
    hub.stop().await;
}

#[tokio::test]
async fn test_hub_shutdown_closes_viewer_without_reconnect() {
    let hub = start_hub(0).await;
    let sink = RecordingSink::default();
    let config = viewer_config(hub.addr, false);

    let viewer = {
        let mut sink = sink.clone();
        tokio::spawn(async move { run_viewer(&config, &mut sink, CancellationToken::new()).await })
    };
    wait_for(|| hub.hub.subscriber_count() == 1).await;
    hub.hub.publish(r#"{"symbol":"KEPTCE","LTP":1}"#);
    wait_for(|| sink.last_symbols() == ["KEPTCE"]).await;

    hub.stop().await;
    let consumer = timeout(Duration::from_secs(3), viewer)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(consumer.is_closed());
    assert_eq!(consumer.model().latest().and_then(Record::symbol), Some("KEPTCE"));
    assert!(!sink.connected());
}

#[tokio::test]
async fn test_reconnect_keeps_model_and_skips_missed_messages() {
    let hub = start_hub(0).await;
    let port = hub.addr.port();
    let sink = RecordingSink::default();
    let config = viewer_config(hub.addr, true);
    let shutdown = CancellationToken::new();

    let viewer = {
        let mut sink = sink.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { run_viewer(&config, &mut sink, shutdown).await })
    };
    wait_for(|| hub.hub.subscriber_count() == 1).await;
    hub.hub.publish(r#"{"symbol":"BEFORECE","LTP":1}"#);
    wait_for(|| sink.last_symbols() == ["BEFORECE"]).await;

    hub.stop().await;
    wait_for(|| !sink.connected()).await;

    let hub = start_hub(port).await;
    wait_for(|| hub.hub.subscriber_count() == 1).await;
    hub.hub.publish(r#"{"symbol":"AFTERCE","LTP":2}"#);
    wait_for(|| sink.last_symbols() == ["AFTERCE", "BEFORECE"]).await;

    shutdown.cancel();
    let consumer = timeout(Duration::from_secs(3), viewer)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(consumer.accepted(), 2);
    hub.stop().await;
}

#[tokio::test]
async fn test_unreachable_hub_without_reconnect_fails() {
    let config = ViewerConfig {
        hub_url: "ws://127.0.0.1:1/data".to_string(),
        reconnect: false,
        ..Default::default()
    };
    let mut sink = RecordingSink::default();
    let result = timeout(
        Duration::from_secs(3),
        run_viewer(&config, &mut sink, CancellationToken::new()),
    )
    .await
    .unwrap();
    let err = assert_err!(result);
    assert!(matches!(err, ViewerError::Tungstenite(_)));
}

#[tokio::test]
async fn test_reconnect_attempts_exhausted() {
    let config = ViewerConfig {
        hub_url: "ws://127.0.0.1:1/data".to_string(),
        reconnect: true,
        policy: ReconnectPolicy {
            max_reconnect_attempts: 2,
            reconnect_base_delay_ms: 1,
            reconnect_max_delay_ms: 5,
        },
        ..Default::default()
    };
    let mut sink = RecordingSink::default();
    let result = timeout(
        Duration::from_secs(3),
        run_viewer(&config, &mut sink, CancellationToken::new()),
    )
    .await
    .unwrap();
    let err = assert_err!(result);
    assert!(matches!(err, ViewerError::ConnectionFailed(_)));
}
