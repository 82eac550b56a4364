//! CLI subcommands

pub mod check;
pub mod lower;
pub mod run;

use anyhow::Context;
use relay_engine::{EngineConfig, Program};
use std::path::Path;

const DEFAULT_CONFIG: &str = "relay.toml";

/// Read a resolved program from JSON
pub fn read_program(path: &Path) -> anyhow::Result<Program> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the explicit config, else `./relay.toml`, else defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG).exists() => Path::new(DEFAULT_CONFIG),
        None => return Ok(EngineConfig::default()),
    };
    let config = EngineConfig::from_file(path).with_context(|| format!("Failed to load {}", path.display()))?;
    tracing::debug!(config = %path.display(), "loaded configuration");
    Ok(config)
}
