use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sampling interval must be a positive number of milliseconds, got {0}")]
    Interval(f64),
}

/// Settings shared by the call tree and the chart builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Sampling interval in milliseconds. The last sample of a range is drawn
    /// this wide.
    pub interval: f64,
    /// Show tracing durations with three fractional digits instead of one.
    pub is_high_precision: bool,
    /// Category used when merged frames disagree.
    pub default_category: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval: 1.0,
            is_high_precision: false,
            default_category: 0,
        }
    }
}

impl EngineConfig {
    pub fn from_json(data: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_finite() && self.interval > 0.0 {
            Ok(())
        } else {
            Err(ConfigError::Interval(self.interval))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = EngineConfig::from_json(br#"{"isHighPrecision": true}"#).unwrap();
        assert_eq!(
            config,
            EngineConfig {
                is_high_precision: true,
                ..EngineConfig::default()
            }
        );
    }

    #[test]
    fn parses_all_fields() {
        let json = br#"{"interval": 0.5, "isHighPrecision": false, "defaultCategory": 3}"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.interval, 0.5);
        assert_eq!(config.default_category, 3);
    }

    #[test]
    fn rejects_non_positive_interval() {
        let err = EngineConfig::from_json(br#"{"interval": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Interval(v) if v == 0.0));
        assert!(EngineConfig::from_json(br#"{"interval": -2.0}"#).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = EngineConfig::from_json(b"{interval").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
        assert!(err.to_string().starts_with("invalid config JSON"));
    }
}
