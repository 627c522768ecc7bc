//! # Error Types
//!
//! Domain-specific error types for vitrine-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  vitrine-core errors (this file)                                       │
//! │  ├── CoreError        - Snapshot codec and domain failures             │
//! │  └── ValidationError  - Catalog / identifier validation failures       │
//! │                                                                         │
//! │  vitrine-store errors (separate crate)                                 │
//! │  └── StoreError       - Backend, config and service failures           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StoreError → (absorbed + logged)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Snapshot codec failures never reach the UI: the store treats them as soft
//! failures and falls back (see `vitrine-store::persistence`).

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Snapshot could not be serialized.
    ///
    /// Should not occur in practice: every snapshot field is plain data.
    #[error("Failed to encode snapshot: {0}")]
    Encode(String),

    /// Snapshot bytes are malformed (not JSON, missing fields, wrong types).
    #[error("Failed to decode snapshot: {0}")]
    Decode(String),

    /// Snapshot was written by an incompatible schema version.
    ///
    /// ## When This Occurs
    /// - A newer build wrote the remote replica and this device is older
    /// - A blob from an unrelated writer sits at the snapshot key
    #[error("Unsupported snapshot version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Persisted order status name is not one of the known statuses.
    #[error("Unknown order status: {0}")]
    UnknownOrderStatus(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Duplicate value (e.g., two catalog products with the same id).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::UnsupportedVersion {
            found: 7,
            supported: 1,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported snapshot version 7 (supported: 1)"
        );

        let err = ValidationError::Duplicate {
            field: "product id".to_string(),
            value: "headset-pro".to_string(),
        };
        assert_eq!(err.to_string(), "product id 'headset-pro' already exists");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "product id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
