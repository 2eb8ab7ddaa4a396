//! Error types for Cosmos

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using Cosmos Error
pub type Result<T> = std::result::Result<T, Error>;

/// Cosmos error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid file pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Failed to scan {path}: {reason}")]
    Scan { path: PathBuf, reason: String },

    #[error("Failed to generate manifest: {0}")]
    Generation(String),

    #[error("Failed to watch {path}: {reason}")]
    Watch { path: PathBuf, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
