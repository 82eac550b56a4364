//! Engine configuration (relay.toml)
//!
//! Every field is defaulted, so an empty file and a missing `[runtime]`
//! table are both valid.

use crate::compiler::LowerOptions;
use crate::vm::RuntimeOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `[lower]` table
    pub lower: LowerOptions,
    /// `[runtime]` table
    pub runtime: RuntimeOptions,
}

impl EngineConfig {
    /// Parse a configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.max_call_depth == 0 {
            return Err(ConfigError::Invalid("runtime.max_call_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.lower.verify);
        assert!(config.lower.source_locations);
        assert_eq!(config.runtime.max_call_depth, 1024);
    }

    #[test]
    fn test_partial_tables() {
        let config = EngineConfig::from_toml_str("[lower]\nsource_locations = false\n").unwrap();
        assert!(config.lower.verify);
        assert!(!config.lower.source_locations);
    }

    #[test]
    fn test_rejects_zero_call_depth() {
        let err = EngineConfig::from_toml_str("[runtime]\nmax_call_depth = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = EngineConfig::from_toml_str("[lower\nverify = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("relay.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[runtime]\nmax_call_depth = 64").unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.runtime.max_call_depth, 64);

        let missing = EngineConfig::from_file(&temp_dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
