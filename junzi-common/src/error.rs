//! Common error types for Junzi

use thiserror::Error;

use crate::validation::ValidationReport;

/// Common result type for Junzi operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the passage store and ingestion tooling
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested work or chapter not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Work document rejected by the validator; nothing was published
    #[error("Validation failed: {0}")]
    Validation(ValidationReport),

    /// Split parts do not reconstruct the original paragraph
    #[error("Split invariant violated at {path}: {reason}")]
    SplitInvariant { path: String, reason: String },

    /// A split proposal was applied without operator acceptance
    #[error("Review required: {0}")]
    ReviewRequired(String),
}

impl Error {
    /// True when the error is a lookup miss rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
