//! Viewer error types.

use thiserror::Error;

/// A single update could not be applied to the view model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsumerError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Consumer closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ViewerResult<T> = Result<T, ViewerError>;
