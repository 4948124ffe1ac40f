//! Client-side stream consumer.

use crate::error::ConsumerError;
use crate::model::ViewModel;
use tick_core::{parse_line, Record};
use tracing::{debug, warn};

/// Applies hub messages to a `ViewModel`.
#[derive(Debug)]
pub struct StreamConsumer {
    model: ViewModel,
    closed: bool,
    accepted: u64,
    rejected: u64,
}

impl StreamConsumer {
    pub fn new(capacity: usize) -> Self {
        Self {
            model: ViewModel::new(capacity),
            closed: false,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Decode one message and put it at the front of the model.
    ///
    /// The hub carries either JSON records or raw producer lines, so text
    /// that is not JSON at all is read with the producer line grammar. Valid
    /// JSON that is not a flat object of numbers and strings, or a line
    /// without tokens, is logged and discarded; the model is left unchanged.
    /// After `on_close` every message is ignored with `ConsumerError::Closed`.
    pub fn on_message(&mut self, text: &str) -> Result<(), ConsumerError> {
        if self.closed {
            debug!("Ignoring message after close");
            return Err(ConsumerError::Closed);
        }

        match decode(text) {
            Ok(record) => {
                self.model.push(record);
                self.accepted += 1;
                Ok(())
            }
            Err(reason) => {
                self.rejected += 1;
                warn!(error = %reason, "Discarding invalid record");
                Err(ConsumerError::InvalidRecord(reason))
            }
        }
    }

    /// Stop accepting updates.
    pub fn on_close(&mut self) {
        if !self.closed {
            debug!(
                accepted = self.accepted,
                rejected = self.rejected,
                "Consumer closed"
            );
        }
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn model(&self) -> &ViewModel {
        &self.model
    }

    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

fn decode(text: &str) -> Result<Record, String> {
    match Record::from_json(text) {
        Ok(record) => Ok(record),
        Err(e) if serde_json::from_str::<serde_json::Value>(text).is_ok() => Err(e.to_string()),
        Err(_) => parse_line(text).map_err(|e| e.to_string()),
    }
}
