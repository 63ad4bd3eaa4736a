//! Error types for refcheck
//!
//! Fatal conditions are `RefcheckError`; non-fatal ones are collected as
//! [`crate::types::RunWarning`] values and never travel through `Result`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to load or validate the YAML configuration. Always fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config {0} must contain a mapping at the top level")]
    NotMapping(PathBuf),

    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Refcheck error type
#[derive(Error, Debug)]
pub enum RefcheckError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pattern error: {0}")]
    Pattern(String),

    #[error("Failed to write report {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Archive directory {path} is not usable: {message}")]
    ArchiveDir { path: PathBuf, message: String },

    #[error("Reference matching worker panicked")]
    WorkerPanic,

    #[error("Run interrupted during {0}")]
    Interrupted(&'static str),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RefcheckError>;
