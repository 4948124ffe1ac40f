//! Feed relay error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Failed to spawn producer {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Producer terminated: code={code:?}, signal={signal:?}")]
    UpstreamTerminated {
        code: Option<i32>,
        signal: Option<i32>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Core error: {0}")]
    Core(#[from] tick_core::CoreError),
}

pub type FeedResult<T> = Result<T, FeedError>;
