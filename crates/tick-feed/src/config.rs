//! Feed relay configuration.

use serde::{Deserialize, Serialize};
use tick_core::ReconnectPolicy;

/// What the relay sends to the hub for each producer line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardMode {
    /// The parsed record as a flat JSON object.
    #[default]
    Json,
    /// The line exactly as the producer printed it.
    Raw,
}

/// Feed relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Hub ingest endpoint.
    #[serde(default = "default_hub_url")]
    pub hub_url: String,
    /// Producer executable. Empty means read lines from our own stdin.
    #[serde(default)]
    pub command: String,
    /// Producer arguments.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub forward: ForwardMode,
    /// Lines buffered while the hub socket is busy. Lines beyond this are
    /// dropped.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    #[serde(flatten)]
    pub reconnect: ReconnectPolicy,
}

fn default_hub_url() -> String {
    "ws://127.0.0.1:8080/ingest".to_string()
}

fn default_outbound_capacity() -> usize {
    1024
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            hub_url: default_hub_url(),
            command: String::new(),
            args: Vec::new(),
            forward: ForwardMode::default(),
            outbound_capacity: default_outbound_capacity(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl FeedConfig {
    /// True when lines come from our stdin instead of a child process.
    pub fn reads_stdin(&self) -> bool {
        self.command.trim().is_empty()
    }
}
