//! tick-viewer - client side of the tick stream.
//!
//! Subscribes to the hub, keeps a bounded newest-first window of records and
//! derives the option chain view from it.
//!
//! # Architecture
//!
//! ```text
//! GET /data ──▶ run_viewer ──▶ StreamConsumer::on_message ──▶ ViewModel
//!                                                               │
//!                 RenderSink::render ◀── projection::option_chain ◀┘
//! ```

pub mod client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod model;
pub mod projection;
pub mod render;

pub use client::run_viewer;
pub use config::ViewerConfig;
pub use consumer::StreamConsumer;
pub use error::{ConsumerError, ViewerError, ViewerResult};
pub use model::ViewModel;
pub use projection::{
    filter_by_class, filter_by_expiry_and_strike, option_chain, split_by_option_type,
    unique_expiries, unique_strikes, ChainRow, PricingContext,
};
pub use render::{RenderSink, TerminalSink};
