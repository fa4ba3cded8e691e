//! Error types for key migration.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Failed to access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] globset::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid rule #{index}: {message}")]
    InvalidRule { index: usize, message: String },

    #[error("Unknown rule set: {0}")]
    UnknownRuleSet(String),

    #[error("No files matched the specified criteria")]
    NoFilesMatched,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MigrateError {
    /// Wraps an IO error with the path that caused it.
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrateError::FileAccess {
            path: path.into(),
            source,
        }
    }
}

/// A specialized Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
