//! Hub configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hub server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Address to bind.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port to listen on (0 = pick a free port).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum concurrent subscriber connections.
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
    /// Outbound queue length per subscriber. When full, new messages are
    /// dropped for that subscriber.
    #[serde(default = "default_subscriber_queue_capacity")]
    pub subscriber_queue_capacity: usize,
    /// Close the producer connection after this long without a message
    /// (0 = never).
    #[serde(default)]
    pub producer_idle_timeout_ms: u64,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_subscribers() -> usize {
    100
}

fn default_subscriber_queue_capacity() -> usize {
    256
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_subscribers: default_max_subscribers(),
            subscriber_queue_capacity: default_subscriber_queue_capacity(),
            producer_idle_timeout_ms: 0,
        }
    }
}

impl HubConfig {
    /// `host:port` string for binding.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Producer idle timeout, if enabled.
    pub fn producer_idle_timeout(&self) -> Option<Duration> {
        (self.producer_idle_timeout_ms > 0)
            .then(|| Duration::from_millis(self.producer_idle_timeout_ms))
    }
}
