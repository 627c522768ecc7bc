//! # Validation Module
//!
//! Input normalisation and validation for store and catalog data.
//!
//! ## Usage
//! ```rust
//! use vitrine_core::validation::{normalize_badge, validate_product_id};
//!
//! assert_eq!(normalize_badge(Some("  New  ")), Some("New".to_string()));
//! assert_eq!(normalize_badge(Some("   ")), None);
//! assert!(validate_product_id("").is_err());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Normalises a badge label.
///
/// ## Rules
/// - Leading/trailing whitespace is trimmed
/// - An empty (or whitespace-only) label means "no badge"
pub fn normalize_badge(label: Option<&str>) -> Option<String> {
    label
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

/// Validates a catalog product id.
///
/// Ids are opaque, but an empty or whitespace-only id can never be resolved
/// and would silently vanish from every derived list.
pub fn validate_product_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "product id".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_badge() {
        assert_eq!(normalize_badge(None), None);
        assert_eq!(normalize_badge(Some("")), None);
        assert_eq!(normalize_badge(Some(" \t\n ")), None);
        assert_eq!(normalize_badge(Some("Sale")), Some("Sale".to_string()));
        assert_eq!(
            normalize_badge(Some("  Limited Edition ")),
            Some("Limited Edition".to_string())
        );
    }

    #[test]
    fn test_validate_product_id() {
        assert!(validate_product_id("vr-headset").is_ok());
        assert!(validate_product_id("").is_err());
        assert!(validate_product_id("   ").is_err());
    }
}
