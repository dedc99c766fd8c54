//! Error types for configuration, connections and profiles.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading settings or managing profiles.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A file exists but could not be parsed.
    #[error("failed to parse {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// Profile names are limited to letters, digits, `_`, `.` and `-`.
    #[error("invalid profile name: {0:?}")]
    InvalidProfileName(String),

    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("profile already exists: {0}")]
    ProfileExists(String),

    /// A profile is missing something it needs (url, username, secret).
    #[error("incomplete profile {name}: {reason}")]
    IncompleteProfile { name: String, reason: String },

    /// The OS keyring refused an operation.
    #[error("secret store error: {0}")]
    Secret(String),

    /// No platform configuration directory and no override.
    #[error("could not determine configuration directory")]
    NoConfigDir,

    #[error("failed to serialize profile: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Building or using a portal connection failed.
    #[error(transparent)]
    Portal(#[from] mygis_portal::PortalError),
}
