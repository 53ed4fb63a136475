//! Core runtime configuration.
//!
//! # Responsibility
//! - Hold the tunable constants for routing, undo and confirmation flows.
//! - Load overrides from `LAZYBRAIN_*` environment variables.
//!
//! # Invariants
//! - The confidence threshold stays inside `[0, 1]`.
//! - Defaults match the documented behavior (threshold 0.60, undo ring of
//!   10, pending-delete slot expiring after 5 minutes).

use serde::{Deserialize, Serialize};

const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.60;
const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 6;
const DEFAULT_UNDO_CAPACITY: usize = 10;
const DEFAULT_PENDING_DELETE_TTL_SECS: i64 = 300;
const DEFAULT_TIMEZONE: &str = "America/Denver";
const DEFAULT_MORNING_HOUR: u8 = 7;
const DEFAULT_EVENING_HOUR: u8 = 21;

/// Tunables for the capture/route/manage core.
///
/// The threshold and the paused-state rule are deliberately configuration,
/// not hard-coded policy; see `CoreConfig::default` for the shipped values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Classification confidence at or above this value auto-routes.
    pub confidence_threshold: f64,
    /// Upper bound on one external classification round-trip.
    pub classifier_timeout_secs: u64,
    /// Per-user undo ring size; oldest entries are evicted beyond this.
    pub undo_capacity: usize,
    /// Seconds before an unconfirmed pending delete expires silently.
    pub pending_delete_ttl_secs: i64,
    /// Fallback timezone when a user has no settings row.
    pub default_timezone: String,
    /// Default local hour for the morning report.
    pub morning_hour: u8,
    /// Default local hour for the evening report.
    pub evening_hour: u8,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            classifier_timeout_secs: DEFAULT_CLASSIFIER_TIMEOUT_SECS,
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            pending_delete_ttl_secs: DEFAULT_PENDING_DELETE_TTL_SECS,
            default_timezone: DEFAULT_TIMEZONE.to_string(),
            morning_hour: DEFAULT_MORNING_HOUR,
            evening_hour: DEFAULT_EVENING_HOUR,
        }
    }
}

impl CoreConfig {
    /// Builds a config from defaults plus `LAZYBRAIN_*` env overrides.
    ///
    /// Unparseable override values are ignored in favor of the default; a
    /// misconfigured deployment should degrade to shipped behavior rather
    /// than refuse to start.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = env_parse::<f64>("LAZYBRAIN_CONFIDENCE_THRESHOLD") {
            config.confidence_threshold = value;
        }
        if let Some(value) = env_parse::<u64>("LAZYBRAIN_CLASSIFIER_TIMEOUT_SECS") {
            config.classifier_timeout_secs = value;
        }
        if let Some(value) = env_parse::<usize>("LAZYBRAIN_UNDO_CAPACITY") {
            config.undo_capacity = value;
        }
        if let Some(value) = env_parse::<i64>("LAZYBRAIN_PENDING_DELETE_TTL_SECS") {
            config.pending_delete_ttl_secs = value;
        }
        if let Ok(value) = std::env::var("LAZYBRAIN_TIMEZONE") {
            if !value.trim().is_empty() {
                config.default_timezone = value.trim().to_string();
            }
        }
        config
    }

    /// Validates invariant-bearing fields.
    ///
    /// # Errors
    /// - Threshold outside `[0, 1]`.
    /// - Zero undo capacity or non-positive pending-delete TTL.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if self.undo_capacity == 0 {
            return Err("undo_capacity must be at least 1".to_string());
        }
        if self.pending_delete_ttl_secs <= 0 {
            return Err("pending_delete_ttl_secs must be positive".to_string());
        }
        if self.morning_hour > 23 || self.evening_hour > 23 {
            return Err("report hours must be within 0..=23".to_string());
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::CoreConfig;

    #[test]
    fn defaults_are_valid() {
        let config = CoreConfig::default();
        config.validate().expect("defaults must validate");
        assert_eq!(config.confidence_threshold, 0.60);
        assert_eq!(config.undo_capacity, 10);
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let config = CoreConfig {
            confidence_threshold: 1.5,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_undo_capacity() {
        let config = CoreConfig {
            undo_capacity: 0,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
