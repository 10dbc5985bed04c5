//! Error taxonomy for the imputation benchmark
//!
//! Mechanism, injector and metric failures signal misconfiguration and are
//! returned to the caller untouched. Only the experiment runner downgrades
//! errors into skipped sweep combinations.

use std::time::Duration;

use thiserror::Error;

/// Comprehensive error types for benchmark operations
#[derive(Debug, Error)]
pub enum ImputeBenchError {
    #[error("Malformed structure description: {0}")]
    Format(String),

    #[error("Unsupported missingness mechanism: {0}")]
    UnsupportedMechanism(String),

    #[error("Unsupported imputation algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Mechanism {mechanism} cannot be realized: {reason}")]
    InsufficientComplement { mechanism: String, reason: String },

    #[error("Invalid {name}: {value} (expected {expected})")]
    InvalidRate {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("Mask selects no suppressed cell; reconstruction error is undefined")]
    EmptyMask,

    #[error("{collaborator} failed: {reason}")]
    ExternalCollaborator { collaborator: String, reason: String },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Invalid parameter: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("{algorithm} did not finish within {limit:?}")]
    Timeout { algorithm: String, limit: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImputeBenchError {
    /// Wraps a failure reported by a collaborator outside the core
    pub fn external(collaborator: impl Into<String>, reason: impl ToString) -> Self {
        Self::ExternalCollaborator {
            collaborator: collaborator.into(),
            reason: reason.to_string(),
        }
    }

    /// Short stable label used in skip logs and result tables
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Format(_) => "format",
            Self::UnsupportedMechanism(_) => "unsupported-mechanism",
            Self::UnsupportedAlgorithm(_) => "unsupported-algorithm",
            Self::InsufficientComplement { .. } => "insufficient-complement",
            Self::InvalidRate { .. } => "invalid-rate",
            Self::EmptyMask => "empty-mask",
            Self::ExternalCollaborator { .. } => "external-collaborator",
            Self::InvalidDataset(_) => "invalid-dataset",
            Self::UnknownVariable(_) => "unknown-variable",
            Self::ShapeMismatch { .. } => "shape-mismatch",
            Self::InvalidParameter { .. } => "invalid-parameter",
            Self::Timeout { .. } => "timeout",
            Self::Io(_) => "io",
        }
    }
}

impl From<csv::Error> for ImputeBenchError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            return Self::Io(err.into());
        }
        Self::InvalidDataset(format!("malformed CSV: {}", err))
    }
}

impl From<serde_json::Error> for ImputeBenchError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            return Self::Io(err.into());
        }
        Self::InvalidParameter {
            name: "json".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ImputeBenchError>;
