//! Tuning configuration shared by the state machine and both peers
//!
//! None of these numbers have a derivation behind them; they are knobs.
//! Every field has a default so a partial config document is valid.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of quick-access slots on a character
pub const DEFAULT_QUICK_SLOT_COUNT: usize = 4;

/// Tuning values for reload timing and prediction
///
/// # Example
///
/// ```
/// use armory_core::AmmoConfig;
///
/// let config = AmmoConfig::default();
/// assert_eq!(config.emergency_reload_factor, 0.8);
/// assert_eq!(config.prediction_timeout, 3.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmmoConfig {
    /// Emergency reload time as a fraction of the tactical time, in `(0, 1]`
    pub emergency_reload_factor: f32,
    /// Seconds to rack a round without swapping magazines
    pub chamber_only_duration: f32,
    /// Seconds a client prediction may stay unresolved before self-rollback
    pub prediction_timeout: f64,
    /// Number of quick-access slots
    pub quick_slot_count: usize,
    /// Seconds of clock skew the authority tolerates on reload completion
    pub reload_completion_grace: f64,
}

impl AmmoConfig {
    /// Builder: set the prediction timeout
    pub fn with_prediction_timeout(mut self, seconds: f64) -> Self {
        self.prediction_timeout = seconds;
        self
    }

    /// Builder: set the emergency reload factor
    pub fn with_emergency_factor(mut self, factor: f32) -> Self {
        self.emergency_reload_factor = factor;
        self
    }

    /// Check all values are in range
    pub fn validate(&self) -> Result<()> {
        if !(self.emergency_reload_factor > 0.0 && self.emergency_reload_factor <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "emergency_reload_factor must be in (0, 1], got {}",
                self.emergency_reload_factor
            )));
        }
        if self.chamber_only_duration <= 0.0 {
            return Err(Error::InvalidConfig(
                "chamber_only_duration must be positive".into(),
            ));
        }
        if self.prediction_timeout <= 0.0 {
            return Err(Error::InvalidConfig(
                "prediction_timeout must be positive".into(),
            ));
        }
        if self.quick_slot_count == 0 {
            return Err(Error::InvalidConfig(
                "quick_slot_count must be at least 1".into(),
            ));
        }
        if self.reload_completion_grace < 0.0 {
            return Err(Error::InvalidConfig(
                "reload_completion_grace cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AmmoConfig {
    fn default() -> Self {
        Self {
            emergency_reload_factor: 0.8,
            chamber_only_duration: 0.5,
            prediction_timeout: 3.0,
            quick_slot_count: DEFAULT_QUICK_SLOT_COUNT,
            reload_completion_grace: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: AmmoConfig = ron::from_str("(prediction_timeout: 1.5)").unwrap();
        assert_eq!(config.prediction_timeout, 1.5);
        assert_eq!(config.emergency_reload_factor, 0.8);
        assert_eq!(config.quick_slot_count, 4);
    }

    #[test]
    fn test_validate_ranges() {
        assert!(AmmoConfig::default().with_emergency_factor(1.0).validate().is_ok());
        assert!(AmmoConfig::default().with_emergency_factor(0.0).validate().is_err());
        assert!(AmmoConfig::default().with_emergency_factor(1.2).validate().is_err());
        assert!(AmmoConfig::default()
            .with_prediction_timeout(0.0)
            .validate()
            .is_err());

        let no_slots = AmmoConfig {
            quick_slot_count: 0,
            ..AmmoConfig::default()
        };
        assert!(matches!(no_slots.validate(), Err(Error::InvalidConfig(_))));
    }
}
