use std::io;
use std::path::PathBuf;

use crate::features::{FeatureKey, FeatureKind};

/// Errors raised while turning a recording or a stored profile into features.
/// Any of these aborts the load entirely.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{} is not a csv file", .0.display())]
    NotCsv(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Wrong field count, unknown action or unparseable timestamp.
    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    #[error("invalid feature profile: {0}")]
    Profile(#[from] serde_json::Error),
}

/// Errors raised while scoring a verification sample against a template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerifyError {
    #[error("key {0} is not among the matched keys")]
    KeyNotFound(FeatureKey),

    /// No matched keys (or a degenerate disorder maximum) to divide by.
    #[error("cannot score {0}: nothing to divide by")]
    DivisionByZero(FeatureKind),

    #[error("unknown verifier `{0}` (expected absolute, relative or similarity)")]
    InvalidVerifier(String),
}

/// Crate-level error for operations that both load and verify.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to list {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
