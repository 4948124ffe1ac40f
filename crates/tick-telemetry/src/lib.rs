//! Prometheus metrics and structured logging for tickrelay.
//!
//! - Structured logging with tracing (pretty in development, JSON in production)
//! - Prometheus counters for ingestion, fan-out and drops
//! - Text exposition for the hub's `/metrics` route

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with_default};
pub use metrics::Metrics;
