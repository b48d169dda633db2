//! MB-003: Variable Store, the single mutable aggregate of a run.
//!
//! Keys follow the instrument naming convention: `Time`, `<Channel>.PV`,
//! `<Channel>.PV.TSP`, `<Channel>.PV.Rate`, `Shutter.<Name>`, plus anything a
//! recipe defines. Insertion order is kept so snapshots and exports list
//! channels in a stable order.

use super::error::{Result, SimError};
use super::types::{Snapshot, Value};
use indexmap::IndexMap;

/// Simulated clock key (seconds).
pub const TIME_KEY: &str = "Time";

/// Written when a wait block begins.
pub const WAIT_START_KEY: &str = "waitStartTime";

/// Prefix for gate states.
pub const SHUTTER_PREFIX: &str = "Shutter.";

/// Channels advanced by the ramp law every simulated second.
pub const RAMPED_CHANNELS: [&str; 6] = ["Manip", "Ga", "In", "As", "Sb", "Al"];

/// Built-in values every run starts from.
const DEFAULTS: &[(&str, Value)] = &[
    ("Time", Value::Number(0.0)),
    ("Manip.PV", Value::Number(200.0)),
    ("Manip.PV.TSP", Value::Number(200.0)),
    ("Manip.PV.Rate", Value::Number(20.0)),
    ("Manip.RS.RPM", Value::Number(0.0)),
    ("Ga.PV", Value::Number(550.0)),
    ("Ga.PV.TSP", Value::Number(550.0)),
    ("Ga.PV.Rate", Value::Number(30.0)),
    ("In.PV", Value::Number(515.0)),
    ("In.PV.TSP", Value::Number(515.0)),
    ("In.PV.Rate", Value::Number(15.0)),
    ("As.PV", Value::Number(374.0)),
    ("As.PV.TSP", Value::Number(374.0)),
    ("As.PV.Rate", Value::Number(30.0)),
    ("AsCracker.PV", Value::Number(600.0)),
    ("AsCracker.PV.Rate", Value::Number(2.0)),
    ("Sb.PV", Value::Number(250.0)),
    ("Sb.PV.TSP", Value::Number(250.0)),
    ("Sb.PV.Rate", Value::Number(5.0)),
    ("SbCracker.PV", Value::Number(800.0)),
    ("SbCracker.PV.Rate", Value::Number(10.0)),
    ("Al.PV", Value::Number(750.0)),
    ("Al.PV.TSP", Value::Number(750.0)),
    ("Al.PV.Rate", Value::Number(20.0)),
    ("SUKO.OP", Value::Number(30.0)),
    ("Shutter.In", Value::Bool(false)),
    ("Shutter.Ga", Value::Bool(false)),
    ("Shutter.As", Value::Bool(false)),
    ("Shutter.Al", Value::Bool(false)),
    ("Shutter.Sb", Value::Bool(false)),
    ("Shutter.SUSI", Value::Bool(false)),
    ("Shutter.SUKO", Value::Bool(false)),
    ("Shutter.Pyrometer", Value::Bool(false)),
];

/// Mapping from key to value.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableStore {
    values: IndexMap<String, Value>,
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl VariableStore {
    /// An empty store, without built-ins.
    pub fn empty() -> Self {
        Self {
            values: IndexMap::new(),
        }
    }

    /// A store holding the built-in instrument defaults.
    pub fn with_defaults() -> Self {
        let mut store = Self::empty();
        for (key, value) in DEFAULTS {
            store.set(*key, *value);
        }
        store
    }

    /// Look up a key. Absent keys are an error.
    pub fn get(&self, key: &str) -> Result<Value> {
        self.values
            .get(key)
            .copied()
            .ok_or_else(|| SimError::UndefinedVariable(key.to_string()))
    }

    /// Numeric view of a key.
    pub fn get_f64(&self, key: &str) -> Result<f64> {
        self.get(key).map(|v| v.as_f64())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Current simulated time in seconds.
    pub fn time(&self) -> Result<f64> {
        self.get_f64(TIME_KEY)
    }

    /// Deep copy of every entry.
    pub fn snapshot(&self) -> Snapshot {
        self.values.clone()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mb003_defaults() {
        let store = VariableStore::with_defaults();
        assert_eq!(store.time().unwrap(), 0.0);
        assert_eq!(store.get("Ga.PV").unwrap(), Value::Number(550.0));
        assert_eq!(store.get("In.PV.Rate").unwrap(), Value::Number(15.0));
        assert_eq!(store.get("Shutter.Pyrometer").unwrap(), Value::Bool(false));
        assert_eq!(store.get("SUKO.OP").unwrap(), Value::Number(30.0));
        // Ordering follows the defaults table
        assert_eq!(store.iter().next().unwrap().0, "Time");
    }

    #[test]
    fn test_mb003_every_ramped_channel_is_complete() {
        let store = VariableStore::with_defaults();
        for ch in RAMPED_CHANNELS {
            for suffix in [".PV", ".PV.TSP", ".PV.Rate"] {
                assert!(store.contains(&format!("{ch}{suffix}")), "{ch}{suffix}");
            }
        }
    }

    #[test]
    fn test_mb003_get_missing() {
        let store = VariableStore::with_defaults();
        let err = store.get("Ghost.PV").unwrap_err();
        assert!(matches!(err, SimError::UndefinedVariable(ref k) if k == "Ghost.PV"));
    }

    #[test]
    fn test_mb003_set_overwrites_in_place() {
        let mut store = VariableStore::with_defaults();
        let n = store.len();
        store.set("Ga.PV.TSP", 600.0);
        assert_eq!(store.len(), n);
        assert_eq!(store.get_f64("Ga.PV.TSP").unwrap(), 600.0);
        store.set("GrowthRate", 0.5);
        assert_eq!(store.len(), n + 1);
    }

    #[test]
    fn test_mb003_snapshot_is_deep_copy() {
        let mut store = VariableStore::with_defaults();
        let snap = store.snapshot();
        store.set("Time", 5.0);
        assert_eq!(snap["Time"], Value::Number(0.0));
        assert_eq!(store.time().unwrap(), 5.0);
    }
}
