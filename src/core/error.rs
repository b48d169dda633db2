//! MB-009: Error kinds for recipe loading, parsing and execution.
//!
//! Every variant aborts the run it occurs in. The infinite-loop bound is not
//! here: it is a terminal [`RunStatus`](super::types::RunStatus), not an error.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, parsing or simulating a recipe.
#[derive(Error, Debug)]
pub enum SimError {
    /// A line's leading keyword does not match its command grammar
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Substitution or a command referenced a key absent from the store
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// A value or duration suffix is not in the unit table
    #[error("unknown unit '{0}' (expected ms, s, min, hours or days)")]
    Unit(String),

    /// The evaluator could not parse a substituted expression
    #[error("malformed expression: {0}")]
    MalformedExpression(String),

    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),

    /// Run log or export could not be encoded or decoded
    #[error("output error: {0}")]
    Output(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;

impl SimError {
    /// Wrap an I/O failure on `path`.
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Parse error without a known line; the recipe parser fills it in.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            line: 0,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedExpression(message.into())
    }

    /// Attach a line number to a parse error that lacks one.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Self::Parse { line: 0, message } => Self::Parse { line, message },
            other => other,
        }
    }

    /// True when the file simply does not exist (the prompt loop re-asks).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    /// Process exit code. Distinct per kind so callers can branch on them.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { .. } | Self::Config(_) | Self::Output(_) => 1,
            Self::Parse { .. } => 3,
            Self::UndefinedVariable(_) => 4,
            Self::Unit(_) => 5,
            Self::MalformedExpression(_) => 6,
        }
    }
}
