//! Viewer configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;
use tick_core::{Expiry, ReconnectPolicy};

/// Viewer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Hub subscriber endpoint.
    #[serde(default = "default_hub_url")]
    pub hub_url: String,
    /// Records kept in the view model; the oldest is evicted beyond this.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Reconnect after the hub connection drops.
    #[serde(default = "default_reconnect")]
    pub reconnect: bool,
    #[serde(flatten)]
    pub policy: ReconnectPolicy,
    /// Instrument class shown by the option chain (empty = all classes).
    #[serde(default = "default_class_filter")]
    pub class_filter: String,
    /// Risk-free rate for implied volatility.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Spot level used to mark strikes in the money. `None` disables marking.
    #[serde(default = "default_itm_reference")]
    pub itm_reference: Option<f64>,
    /// Expiry shown, e.g. `11JUL24` or `24071` (empty = all expiries).
    #[serde(default)]
    pub expiry_filter: String,
    /// Strike shown (unset = all strikes).
    #[serde(default)]
    pub strike_filter: Option<u32>,
    /// Minimum time between two renders.
    #[serde(default = "default_render_interval_ms")]
    pub render_interval_ms: u64,
}

fn default_hub_url() -> String {
    "ws://127.0.0.1:8080/data".to_string()
}

fn default_capacity() -> usize {
    500
}

fn default_reconnect() -> bool {
    true
}

fn default_class_filter() -> String {
    "FINANCIALS".to_string()
}

fn default_risk_free_rate() -> f64 {
    0.05
}

fn default_itm_reference() -> Option<f64> {
    Some(19_275.0)
}

fn default_render_interval_ms() -> u64 {
    500
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            hub_url: default_hub_url(),
            capacity: default_capacity(),
            reconnect: default_reconnect(),
            policy: ReconnectPolicy::default(),
            class_filter: default_class_filter(),
            risk_free_rate: default_risk_free_rate(),
            itm_reference: default_itm_reference(),
            expiry_filter: String::new(),
            strike_filter: None,
            render_interval_ms: default_render_interval_ms(),
        }
    }
}

impl ViewerConfig {
    /// Class filter, `None` when every class is shown.
    pub fn class(&self) -> Option<&str> {
        let class = self.class_filter.trim();
        (!class.is_empty()).then_some(class)
    }

    /// Expiry filter, `None` when every expiry is shown or the value is not
    /// an expiry.
    pub fn expiry(&self) -> Option<Expiry> {
        let expiry = self.expiry_filter.trim();
        if expiry.is_empty() {
            return None;
        }
        let parsed = Expiry::parse(expiry);
        if parsed.is_none() {
            warn!(expiry, "Ignoring invalid expiry filter");
        }
        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert!(config.reconnect);
        assert_eq!(config.capacity, 500);
        assert_eq!(config.class(), Some("FINANCIALS"));
        assert_eq!(config.itm_reference, Some(19_275.0));
        assert_eq!(config.expiry(), None);
        assert_eq!(config.strike_filter, None);
    }

    #[test]
    fn test_expiry_filter() {
        let mut config = ViewerConfig {
            expiry_filter: " 11jul24 ".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.expiry(),
            Some(Expiry::Calendar(
                chrono::NaiveDate::from_ymd_opt(2024, 7, 11).unwrap()
            ))
        );

        config.expiry_filter = "24071".to_string();
        assert_eq!(config.expiry(), Some(Expiry::Compact("24071".to_string())));

        config.expiry_filter = "next week".to_string();
        assert_eq!(config.expiry(), None);
    }

    #[test]
    fn test_empty_class_filter_means_all() {
        let config = ViewerConfig {
            class_filter: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.class(), None);
    }
}
