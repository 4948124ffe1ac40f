//! Prometheus metrics for tickrelay.
//!
//! All metrics live in the default registry and are exposed by the hub at
//! `/metrics`. They are process-wide; per-hub numbers for the stats endpoint
//! are kept by the hub itself.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure means a duplicate metric
//! name, which is a programming error caught on first access.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

/// Messages accepted from the producer connection.
pub static INGESTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tickrelay_ingested_total",
        "Messages received from the producer connection"
    )
    .unwrap()
});

/// Messages enqueued to a subscriber.
pub static DELIVERED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tickrelay_delivered_total",
        "Messages enqueued to subscriber outbound queues"
    )
    .unwrap()
});

/// Messages dropped for a subscriber.
/// Labels: reason (queue_full/closed)
pub static DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tickrelay_dropped_total",
        "Messages dropped for a single subscriber",
        &["reason"]
    )
    .unwrap()
});

/// Raw lines that did not parse.
pub static PARSE_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tickrelay_parse_errors_total",
        "Raw producer lines without key=value tokens"
    )
    .unwrap()
});

/// Currently registered subscribers.
pub static SUBSCRIBERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("tickrelay_subscribers", "Currently connected subscribers").unwrap()
});

/// Producer connection state (1 = connected).
pub static PRODUCER_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "tickrelay_producer_connected",
        "Producer connection state (1=connected)"
    )
    .unwrap()
});

/// Feed relay line outcomes.
/// Labels: outcome (forwarded/parse_error/dropped)
pub static FEED_LINES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tickrelay_feed_lines_total",
        "Producer stdout lines by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// WebSocket reconnection attempts.
/// Labels: role (feed/viewer)
pub static WS_RECONNECT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tickrelay_ws_reconnect_total",
        "WebSocket reconnection attempts",
        &["role"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn ingested() {
        INGESTED_TOTAL.inc();
    }

    pub fn delivered(count: u64) {
        DELIVERED_TOTAL.inc_by(count);
    }

    /// Record `count` drops for `reason`.
    pub fn dropped(reason: &str, count: u64) {
        if count > 0 {
            DROPPED_TOTAL.with_label_values(&[reason]).inc_by(count);
        }
    }

    pub fn parse_error() {
        PARSE_ERRORS_TOTAL.inc();
    }

    pub fn subscribers_set(count: usize) {
        SUBSCRIBERS.set(count as i64);
    }

    pub fn producer_connected() {
        PRODUCER_CONNECTED.set(1);
    }

    pub fn producer_disconnected() {
        PRODUCER_CONNECTED.set(0);
    }

    pub fn feed_line(outcome: &str) {
        FEED_LINES_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn ws_reconnect(role: &str) {
        WS_RECONNECT_TOTAL.with_label_values(&[role]).inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_touched_metrics() {
        Metrics::ingested();
        Metrics::dropped("queue_full", 2);
        Metrics::subscribers_set(3);

        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("tickrelay_ingested_total"));
        assert!(text.contains("tickrelay_dropped_total{reason=\"queue_full\"}"));
        assert!(text.contains("tickrelay_subscribers"));
    }

    #[test]
    fn test_zero_drops_do_not_create_series() {
        Metrics::dropped("never_used_reason", 0);
        let text = Metrics::gather_text().unwrap();
        assert!(!text.contains("never_used_reason"));
    }
}
