//! Error types for mg-core

use thiserror::Error;

/// Core error type for the migrator
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Failed to parse configuration file
    #[error("[C002] Failed to parse config: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// C003: Invalid configuration value
    #[error("[C003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C004: Loader could not read a migration source directory or file
    #[error("[C004] Failed to read '{path}': {source}")]
    ReadError {
        path: String,
        source: std::io::Error,
    },

    /// C005: Unknown migration kind code read back from storage
    #[error("[C005] Invalid migration kind code: {code}")]
    InvalidMigrationKind { code: i32 },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
