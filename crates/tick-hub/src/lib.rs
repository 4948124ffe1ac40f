//! tick-hub - WebSocket fan-out for live ticks.
//!
//! One producer connection feeds the hub; every message it sends is relayed,
//! byte for byte, to every connected subscriber.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  GET /ingest   ┌──────────────────────────────────────┐
//! │  tick-feed   │ ─────────────▶ │ BroadcastHub::publish                │
//! └──────────────┘                │   SubscriberRegistry::for_each_open  │
//!                                 │     try_send -> per-subscriber queue │
//!                                 └───────┬───────────┬──────────────────┘
//!                                         ▼           ▼
//!                                   writer task   writer task   (one per subscriber)
//!                                         │           │
//!                                  GET /data     GET /data
//! ```
//!
//! Delivery is at-most-once. A subscriber whose queue is full misses the
//! message; nobody else is affected.
//!
//! # Usage
//!
//! ```ignore
//! use tick_hub::{HubConfig, HubServer};
//! use tokio_util::sync::CancellationToken;
//!
//! let server = HubServer::bind(HubConfig::default()).await?;
//! server.run(CancellationToken::new()).await?;
//! ```

mod admission;
mod config;
mod error;
mod hub;
mod registry;
mod server;
mod types;

pub use admission::{Admission, PeerRole, Rejected, Seat};
pub use config::HubConfig;
pub use error::{DeliveryError, HubError, HubResult};
pub use hub::{BroadcastHub, FanOut, Subscription};
pub use registry::{Payload, SubscriberId, SubscriberRegistry};
pub use server::{create_router, AppState, HubServer};
pub use types::HubStats;
