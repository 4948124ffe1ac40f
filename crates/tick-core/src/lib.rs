//! Core domain types for tickrelay.
//!
//! This crate provides the pieces shared by the hub, the feed relay and the
//! viewer:
//! - `Record`: a parsed tick, an ordered field -> value mapping
//! - `parse_line`: the raw `key=value` line grammar emitted by the producer
//! - `OptionSymbol`: instrument symbol decomposition (class, expiry, strike, type)
//! - `implied_volatility`: Black-Scholes solver used by the option chain view
//! - `ReconnectPolicy`: exponential backoff for the WebSocket clients

pub mod analytics;
pub mod backoff;
pub mod error;
pub mod parser;
pub mod record;
pub mod symbol;

pub use analytics::{black_scholes_price, implied_volatility, years_to_expiry, OptionParams};
pub use backoff::ReconnectPolicy;
pub use error::{CoreError, ParseError, Result, SymbolError};
pub use parser::{parse_line, tokenize, Token};
pub use record::{FieldValue, Record};
pub use symbol::{parse_symbol, Expiry, InstrumentClass, OptionSymbol, OptionType};
