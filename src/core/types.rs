//! MB-001: Core types for the recipe simulator.
//!
//! Store values, parsed commands, snapshots and run outcomes. Values and
//! snapshots derive Serialize/Deserialize so runs can be logged and the
//! simulation config can carry store overrides.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

// ============================================================================
// Store values
// ============================================================================

/// A single Variable Store entry: a float quantity or a gate state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
}

impl Value {
    /// Numeric view of the value. Gate states read as 1.0 / 0.0.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Bool(true) => 1.0,
            Self::Bool(false) => 0.0,
        }
    }

    /// Truthiness: non-zero numbers are true.
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
        }
    }
}

/// Literal textual form, as spliced into expressions by substitution.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// ============================================================================
// Units
// ============================================================================

/// Time units accepted after Define values and simple Wait durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl Unit {
    /// Look up a unit suffix (case-insensitive). None if not in the table.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_lowercase().as_str() {
            "ms" => Some(Self::Millis),
            "s" => Some(Self::Seconds),
            "min" => Some(Self::Minutes),
            "hours" => Some(Self::Hours),
            "days" => Some(Self::Days),
            _ => None,
        }
    }

    /// Seconds per unit.
    pub fn seconds(&self) -> f64 {
        match self {
            Self::Millis => 0.001,
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
            Self::Days => 86400.0,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis => write!(f, "ms"),
            Self::Seconds => write!(f, "s"),
            Self::Minutes => write!(f, "min"),
            Self::Hours => write!(f, "hours"),
            Self::Days => write!(f, "days"),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Right-hand side of a Set command. References resolve at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    Literal(Value),
    Reference(String),
}

/// One parsed recipe command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `Define <name> = <value>[ <unit>]`, value already in seconds-equivalent form
    Define { name: String, value: f64 },

    /// `Set <name> = <literal | $var$>`
    Set { name: String, value: SetValue },

    /// `Open a, b` / `Close a, b`
    Shutter { names: Vec<String>, open: bool },

    /// `Wait <duration>` or `Wait Until <expr>`, stored as a `$`-delimited condition
    Wait { condition: String },

    /// `Calculate <name> = <expr>`, whitespace already removed from the expression
    Calculate { name: String, expr: String },

    /// `Include <path>`; parsed, never executed
    Include { path: String },
}

impl Command {
    /// Leading keyword, as written in recipes.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Define { .. } => "Define",
            Self::Set { .. } => "Set",
            Self::Shutter { open: true, .. } => "Open",
            Self::Shutter { open: false, .. } => "Close",
            Self::Wait { .. } => "Wait",
            Self::Calculate { .. } => "Calculate",
            Self::Include { .. } => "Include",
        }
    }
}

/// A command together with its 1-based line number in the recipe file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub line: usize,
    pub command: Command,
}

// ============================================================================
// History
// ============================================================================

/// Immutable copy of the full Variable Store at one simulated second.
pub type Snapshot = IndexMap<String, Value>;

/// Append-only sequence of snapshots recorded while waiting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    snapshots: Vec<Snapshot>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}

// ============================================================================
// Run state
// ============================================================================

/// Why a run stopped early without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Simulated time reached the safety bound inside a wait.
    InfiniteLoop,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InfiniteLoop => write!(f, "infinite loop"),
        }
    }
}

/// Interpreter state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Running,
    /// Shared across ticks
    Waiting { condition: Rc<str> },
    Aborted(AbortReason),
    Completed,
}

/// Terminal status reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Aborted(AbortReason),
}

impl RunStatus {
    pub fn completed_normally(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::Aborted(AbortReason::InfiniteLoop) => 7,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}

/// Everything a finished run hands back.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub history: History,
    /// Store contents when the run halted
    pub final_store: Snapshot,
}

// ============================================================================
// Tests
// ============================================================================
