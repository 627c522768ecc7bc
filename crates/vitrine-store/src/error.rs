//! # Store Error Types
//!
//! Error types for persistence backends, configuration and the store service.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Store Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Backend      │  │     Codec               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Database       │  │  Snapshot(CoreError)    │ │
//! │  │  ConfigLoad     │  │  MigrationFailed│  │                         │ │
//! │  │  ConfigSave     │  │  Io / InvalidKey│  │                         │ │
//! │  │                 │  │  ReplicaUnavail │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │    Service      │   Only this category ever reaches StoreHandle     │
//! │  │                 │   callers. Backend and codec failures are         │
//! │  │  ShuttingDown   │   absorbed by the store task and logged.          │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use vitrine_core::CoreError;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store error type covering backend, configuration and service failures.
#[derive(Debug, Error)]
pub enum StoreError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid store configuration.
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Backend Errors
    // =========================================================================
    /// Local database query or connection failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Local database migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Filesystem error in the replica directory.
    #[error("I/O error: {0}")]
    Io(String),

    /// Storage key contains characters outside `[A-Za-z0-9._-]`.
    #[error("Invalid storage key: '{0}'")]
    InvalidKey(String),

    /// Remote replica cannot be reached right now.
    #[error("Remote replica unavailable: {0}")]
    ReplicaUnavailable(String),

    // =========================================================================
    // Codec Errors
    // =========================================================================
    /// Snapshot encode/decode failed.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] CoreError),

    // =========================================================================
    // Service Errors
    // =========================================================================
    /// Store task has stopped.
    #[error("Commerce store is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(err: toml::ser::Error) -> Self {
        StoreError::ConfigSaveFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_converts() {
        let err: StoreError = CoreError::UnsupportedVersion {
            found: 2,
            supported: 1,
        }
        .into();
        assert!(err.to_string().contains("Unsupported snapshot version 2"));
    }
}
