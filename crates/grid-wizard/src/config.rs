//! Wizard configuration, loadable from YAML.

use crate::error::ConfigError;
use grid_econ::EconConfig;
use persistence::DEFAULT_PREFIX;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardConfig {
    /// Key prefix of draft slots in the session medium.
    pub draft_prefix: String,
    /// Estimation and simulation constants.
    pub econ: EconConfig,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            draft_prefix: DEFAULT_PREFIX.to_string(),
            econ: EconConfig::default(),
        }
    }
}

impl WizardConfig {
    /// Parse YAML; absent fields keep their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}
