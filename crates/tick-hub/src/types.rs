//! Hub API types.

use serde::Serialize;

/// Counters served by `GET /api/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Currently registered subscribers.
    pub subscribers: usize,
    /// Whether a producer connection is open.
    pub producer_connected: bool,
    /// Messages received from the producer.
    pub ingested_total: u64,
    /// Messages enqueued to subscribers (one per subscriber per message).
    pub delivered_total: u64,
    /// Messages dropped for individual subscribers.
    pub dropped_total: u64,
}
