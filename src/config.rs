//! Runtime configuration
//!
//! Forest hyper-parameters shared by the three predictors plus the default log
//! filter for the binary. Every field has a default, so an empty JSON object is
//! a valid configuration.

use crate::error::CareError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default tracing filter directive
pub const DEFAULT_LOG_FILTER: &str = "carewatch=info";

/// Bagged decision-tree ensemble settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_trees: usize,
    /// Seed for the train/test split and bootstrap sampling
    pub seed: u64,
    /// Share of rows held out to report accuracy
    pub test_fraction: f64,
    pub min_samples_split: usize,
    /// Unlimited when absent
    pub max_depth: Option<usize>,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            test_fraction: 0.25,
            min_samples_split: 2,
            max_depth: None,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<(), CareError> {
        if self.n_trees == 0 {
            return Err(CareError::ConfigError("n_trees must be at least 1".to_string()));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(CareError::ConfigError(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.min_samples_split < 2 {
            return Err(CareError::ConfigError(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(CareError::ConfigError("max_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CareConfig {
    pub forest: ForestConfig,
    /// `tracing-subscriber` filter directive used by the binary
    pub log_filter: String,
}

impl Default for CareConfig {
    fn default() -> Self {
        Self {
            forest: ForestConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl CareConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, CareError> {
        let config: CareConfig = serde_json::from_str(json)?;
        config.forest.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CareError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = CareConfig::from_json("{}").unwrap();
        assert_eq!(config, CareConfig::default());
        assert_eq!(config.forest.n_trees, 100);
        assert_eq!(config.forest.seed, 42);
        assert_eq!(config.log_filter, "carewatch=info");
    }

    #[test]
    fn test_partial_override() {
        let config = CareConfig::from_json(r#"{"forest": {"n_trees": 25, "max_depth": 6}}"#).unwrap();
        assert_eq!(config.forest.n_trees, 25);
        assert_eq!(config.forest.max_depth, Some(6));
        assert_eq!(config.forest.seed, 42);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(CareConfig::from_json(r#"{"forest": {"n_trees": 0}}"#).is_err());
        assert!(CareConfig::from_json(r#"{"forest": {"test_fraction": 1.0}}"#).is_err());
        assert!(CareConfig::from_json(r#"{"forest": {"min_samples_split": 1}}"#).is_err());
    }

    #[test]
    fn test_round_trip_json() {
        let config = CareConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(CareConfig::from_json(&json).unwrap(), config);
    }
}
