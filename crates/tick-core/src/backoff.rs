//! Reconnection backoff shared by the feed and viewer WebSocket clients.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on the random jitter added to each delay.
const MAX_JITTER_MS: u64 = 1000;

/// Exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Maximum reconnection attempts (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    #[serde(default = "default_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    #[serde(default = "default_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 0,
            reconnect_base_delay_ms: default_base_delay_ms(),
            reconnect_max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ReconnectPolicy {
    /// True once `attempt` failed attempts use up the budget.
    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_reconnect_attempts > 0 && attempt >= self.max_reconnect_attempts
    }

    /// Delay before reconnection attempt `attempt` (1-based), jitter excluded.
    ///
    /// `base * 2^(attempt-1)`, capped at the configured maximum.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = self
            .reconnect_base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.reconnect_max_delay_ms);
        Duration::from_millis(delay)
    }

    /// `base_delay` plus up to `min(base, 1s)` of jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter_bound = self.reconnect_base_delay_ms.min(MAX_JITTER_MS);
        self.base_delay(attempt) + Duration::from_millis(jitter(jitter_bound))
    }
}

/// Pseudo-random value in `0..=bound`.
fn jitter(bound: u64) -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);
    nanos % (bound + 1)
}
