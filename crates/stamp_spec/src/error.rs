//! Error types for spec parsing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// Errors that can occur while reading a template spec.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Spec file not found at path: {0}")]
    NotFound(PathBuf),

    #[error("Unknown action \"{0}\"")]
    UnknownAction(String),

    #[error("Invalid params for action \"{action}\": {message}")]
    InvalidParams { action: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
