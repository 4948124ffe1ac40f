//! End-to-end fan-out tests over real WebSocket connections.
//!
//! A hub is bound on an ephemeral port; producers and subscribers are plain
//! tokio-tungstenite clients.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tick_core::Record;
use tick_hub::{BroadcastHub, HubConfig, HubServer};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestHub {
    addr: SocketAddr,
    hub: BroadcastHub,
    shutdown: CancellationToken,
}

impl TestHub {
    async fn start() -> Self {
        Self::start_with(HubConfig::default()).await
    }

    async fn start_with(config: HubConfig) -> Self {
        let config = HubConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            ..config
        };
        let server = HubServer::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let hub = server.hub();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            let _ = server.run(token).await;
        });
        Self {
            addr,
            hub,
            shutdown,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    async fn producer(&self) -> Client {
        let (ws, _) = connect_async(self.url("/ingest")).await.unwrap();
        wait_for(|| self.hub.is_producer_connected()).await;
        ws
    }

    /// Connect a subscriber and wait until the hub has registered it.
    async fn subscriber(&self) -> Client {
        let before = self.hub.subscriber_count();
        let (ws, _) = connect_async(self.url("/data")).await.unwrap();
        wait_for(|| self.hub.subscriber_count() > before).await;
        ws
    }
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached within timeout");
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let msg = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("no message within timeout")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return text;
        }
    }
}

async fn assert_silent(client: &mut Client) {
    let result = timeout(Duration::from_millis(200), client.next()).await;
    assert!(result.is_err(), "unexpected message: {result:?}");
}

#[tokio::test]
async fn test_two_subscribers_receive_record() {
    let hub = TestHub::start().await;
    let mut a = hub.subscriber().await;
    let mut b = hub.subscriber().await;
    let mut producer = hub.producer().await;

    let record = tick_core::parse_line("{symbol='FINANCIALS2407119000CE',LTP=120.5,LTQ=10}")
        .unwrap();
    producer
        .send(Message::Text(record.to_json().unwrap()))
        .await
        .unwrap();

    for client in [&mut a, &mut b] {
        let received = Record::from_json(&next_text(client).await).unwrap();
        assert_eq!(received.symbol(), Some("FINANCIALS2407119000CE"));
        assert_eq!(received.get_f64("LTP"), Some(120.5));
        assert_eq!(received.get_f64("LTQ"), Some(10.0));
        assert_eq!(received.len(), 3);
    }
}

#[tokio::test]
async fn test_raw_payload_forwarded_unchanged() {
    let hub = TestHub::start().await;
    let mut sub = hub.subscriber().await;
    let mut producer = hub.producer().await;

    let raw = "Packet{symbol='MAINIDX11JUL2419000CE', LTP=99.95}";
    producer.send(Message::Text(raw.to_string())).await.unwrap();
    assert_eq!(next_text(&mut sub).await, raw);
}

#[tokio::test]
async fn test_disconnected_subscriber_gets_no_backfill() {
    let hub = TestHub::start().await;
    let mut a = hub.subscriber().await;
    let mut b = hub.subscriber().await;
    let mut producer = hub.producer().await;

    a.close(None).await.unwrap();
    wait_for(|| hub.hub.subscriber_count() == 1).await;

    producer.send(Message::Text("missed".into())).await.unwrap();
    assert_eq!(next_text(&mut b).await, "missed");

    let mut a = hub.subscriber().await;
    producer.send(Message::Text("fresh".into())).await.unwrap();
    assert_eq!(next_text(&mut a).await, "fresh");
    assert_eq!(next_text(&mut b).await, "fresh");
    assert_silent(&mut a).await;
}

#[tokio::test]
async fn test_order_preserved_for_each_subscriber() {
    let hub = TestHub::start().await;
    let mut a = hub.subscriber().await;
    let mut b = hub.subscriber().await;
    let mut producer = hub.producer().await;

    let messages: Vec<String> = (0..50).map(|i| format!("{{seq={i}}}")).collect();
    for m in &messages {
        producer.send(Message::Text(m.clone())).await.unwrap();
    }

    for client in [&mut a, &mut b] {
        for expected in &messages {
            assert_eq!(&next_text(client).await, expected);
        }
    }
}

#[tokio::test]
async fn test_second_producer_rejected() {
    let hub = TestHub::start().await;
    let _producer = hub.producer().await;

    let err = connect_async(hub.url("/ingest")).await.unwrap_err();
    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status(), 409),
        other => panic!("expected HTTP 409, got {other:?}"),
    }
}

#[tokio::test]
async fn test_subscriber_limit() {
    let hub = TestHub::start_with(HubConfig {
        max_subscribers: 1,
        ..Default::default()
    })
    .await;
    let _first = hub.subscriber().await;

    let err = connect_async(hub.url("/data")).await.unwrap_err();
    match err {
        tungstenite::Error::Http(response) => assert_eq!(response.status(), 503),
        other => panic!("expected HTTP 503, got {other:?}"),
    }
}

#[tokio::test]
async fn test_producer_exit_keeps_subscribers() {
    let hub = TestHub::start().await;
    let mut sub = hub.subscriber().await;
    let mut producer = hub.producer().await;

    producer.send(Message::Text("last".into())).await.unwrap();
    producer.close(None).await.unwrap();
    wait_for(|| !hub.hub.is_producer_connected()).await;

    assert_eq!(next_text(&mut sub).await, "last");
    assert_eq!(hub.hub.subscriber_count(), 1);

    // A new producer can take over the stream.
    let mut producer = hub.producer().await;
    producer.send(Message::Text("resumed".into())).await.unwrap();
    assert_eq!(next_text(&mut sub).await, "resumed");
}

#[tokio::test]
async fn test_producer_idle_timeout() {
    let hub = TestHub::start_with(HubConfig {
        producer_idle_timeout_ms: 100,
        ..Default::default()
    })
    .await;
    let _sub = hub.subscriber().await;
    let _producer = hub.producer().await;

    wait_for(|| !hub.hub.is_producer_connected()).await;
    assert_eq!(hub.hub.subscriber_count(), 1);
}

#[tokio::test]
async fn test_stats_reflect_traffic() {
    let hub = TestHub::start().await;
    let mut sub = hub.subscriber().await;
    let mut producer = hub.producer().await;
    producer.send(Message::Text("x=1".into())).await.unwrap();
    next_text(&mut sub).await;

    let stats = hub.hub.stats();
    assert_eq!(stats.subscribers, 1);
    assert!(stats.producer_connected);
    assert_eq!(stats.ingested_total, 1);
    assert_eq!(stats.delivered_total, 1);
}
