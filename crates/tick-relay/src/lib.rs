//! tickrelay - live tick fan-out.
//!
//! Three roles share one binary:
//! - `hub`: accepts one producer on `/ingest` and relays to viewers on `/data`
//! - `feed`: runs the producer process and forwards its lines to the hub
//! - `watch`: terminal option chain fed from the hub

pub mod app;
pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
