//! MB-010: Simulation config (YAML).
//!
//! Everything is optional; an absent file means built-in defaults.
//!
//! ```yaml
//! simulation:
//!   max_seconds: 43200
//! variables:
//!   Ga.PV: 560
//!   Shutter.In: true
//! ```

use super::error::{Result, SimError};
use super::store::VariableStore;
use super::types::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Twelve simulated hours, in seconds.
pub const DEFAULT_MAX_SECONDS: f64 = 43_200.0;

/// Root config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: Limits,

    /// Store entries applied over the built-in defaults
    #[serde(default)]
    pub variables: IndexMap<String, Value>,
}

/// Run limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    /// Simulated seconds after which a wait is declared an infinite loop
    #[serde(default = "default_max_seconds")]
    pub max_seconds: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_seconds: DEFAULT_MAX_SECONDS,
        }
    }
}

fn default_max_seconds() -> f64 {
    DEFAULT_MAX_SECONDS
}

impl SimConfig {
    /// The store a run starts from.
    pub fn initial_store(&self) -> VariableStore {
        let mut store = VariableStore::with_defaults();
        for (key, value) in &self.variables {
            store.set(key.clone(), *value);
        }
        store
    }
}

/// Parse a config from YAML text.
pub fn parse_config(yaml: &str) -> Result<SimConfig> {
    let config: SimConfig = serde_yaml_ng::from_str(yaml)
        .map_err(|e| SimError::Config(format!("YAML parse error: {}", e)))?;
    validate_config(&config)?;
    Ok(config)
}

/// Load a config file from disk.
pub fn load_config(path: &Path) -> Result<SimConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    parse_config(&content)
}

/// Load `path` if given, otherwise use defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<SimConfig> {
    path.map_or_else(|| Ok(SimConfig::default()), load_config)
}

fn validate_config(config: &SimConfig) -> Result<()> {
    let max = config.simulation.max_seconds;
    if !max.is_finite() || max < 1.0 {
        return Err(SimError::Config(format!(
            "simulation.max_seconds must be at least 1, got {}",
            max
        )));
    }
    if let Some(key) = config.variables.keys().find(|k| k.trim().is_empty()) {
        return Err(SimError::Config(format!("invalid variable name '{}'", key)));
    }
    if let Some((key, value)) = config
        .variables
        .iter()
        .find(|(_, v)| !v.as_f64().is_finite())
    {
        return Err(SimError::Config(format!(
            "variable '{}' must be a finite number, got {}",
            key, value
        )));
    }
    Ok(())
}
