//! tick-feed - relays a producer process into the hub.
//!
//! The producer is an external program that prints one packet-like line per
//! tick on stdout. The relay spawns it, turns each line into a record and
//! sends it over a single WebSocket to the hub's `/ingest` route.
//!
//! - Automatic reconnection with exponential backoff
//! - Bounded, non-blocking outbound queue; stale ticks are dropped
//! - Producer exit code and signal reported on termination

pub mod config;
pub mod connection;
pub mod error;
pub mod relay;
pub mod source;

pub use config::{FeedConfig, ForwardMode};
pub use connection::{EnqueueError, HubLink, LinkHandle, LinkState};
pub use error::{FeedError, FeedResult};
pub use relay::{encode_line, FeedRelay, FeedStats, LineOutcome};
pub use source::{Upstream, UpstreamExit};
