//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hub error: {0}")]
    Hub(#[from] tick_hub::HubError),

    #[error("Feed error: {0}")]
    Feed(#[from] tick_feed::FeedError),

    #[error("Viewer error: {0}")]
    Viewer(#[from] tick_viewer::ViewerError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tick_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
