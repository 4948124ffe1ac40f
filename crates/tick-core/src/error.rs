//! Error types for tick-core.

use thiserror::Error;

/// Maximum number of characters of the offending line kept in a `ParseError`.
const PREVIEW_CHARS: usize = 64;

/// Raw line could not be turned into a record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("No key=value tokens in line: {0:?}")]
    NoTokens(String),
}

impl ParseError {
    pub(crate) fn no_tokens(line: &str) -> Self {
        Self::NoTokens(line.chars().take(PREVIEW_CHARS).collect())
    }
}

/// Instrument symbol does not follow the option symbol grammar.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("Symbol has no instrument class prefix: {0}")]
    MissingClass(String),

    #[error("Symbol is not an option (no CE/PE suffix): {0}")]
    NotAnOption(String),

    #[error("Symbol has no strike: {0}")]
    MissingStrike(String),

    #[error("Symbol has an invalid expiry: {0}")]
    InvalidExpiry(String),
}

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Symbol error: {0}")]
    Symbol(#[from] SymbolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
