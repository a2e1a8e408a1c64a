//! Run configuration.
//!
//! Fixed at setup. Loadable from TOML:
//!
//! ```toml
//! resource_manage_interval = 100
//! max_simulation_time = 10000
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FogError, FogResult};

fn default_resource_manage_interval() -> u64 {
    100
}

fn default_max_simulation_time() -> u64 {
    10_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Ticks between orchestrator control ticks.
    #[serde(default = "default_resource_manage_interval")]
    pub resource_manage_interval: u64,
    /// Ticks after `start` at which the run terminates.
    #[serde(default = "default_max_simulation_time")]
    pub max_simulation_time: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            resource_manage_interval: default_resource_manage_interval(),
            max_simulation_time: default_max_simulation_time(),
        }
    }
}

impl SimulationConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> FogResult<Self> {
        let config: SimulationConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> FogResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> FogResult<()> {
        if self.resource_manage_interval == 0 {
            return Err(FogError::InvalidConfig(
                "resource_manage_interval must be positive".into(),
            ));
        }
        if self.max_simulation_time == 0 {
            return Err(FogError::InvalidConfig(
                "max_simulation_time must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.resource_manage_interval, 100);
        assert_eq!(config.max_simulation_time, 10_000);
        assert_eq!(SimulationConfig::from_toml_str("").unwrap(), config);
    }

    #[test]
    fn test_partial_document() {
        let config = SimulationConfig::from_toml_str("max_simulation_time = 500").unwrap();
        assert_eq!(config.max_simulation_time, 500);
        assert_eq!(config.resource_manage_interval, 100);
    }

    #[test]
    fn test_zero_rejected() {
        let err = SimulationConfig::from_toml_str("resource_manage_interval = 0").unwrap_err();
        assert!(matches!(err, FogError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_document() {
        let err = SimulationConfig::from_toml_str("max_simulation_time = \"soon\"").unwrap_err();
        assert!(matches!(err, FogError::ConfigParse(_)));
    }
}
