//! # Product Catalog
//!
//! The read-only product lookup table the store resolves `ProductRef`s
//! against.
//!
//! ```text
//! ┌──────────────────────┐  resolve(&ProductRef)   ┌──────────────────────┐
//! │   CommerceState      │ ──────────────────────► │  dyn Catalog         │
//! │   (refs only)        │ ◄────────────────────── │  (products)          │
//! └──────────────────────┘   Option<&Product>      └──────────────────────┘
//! ```
//!
//! There is no mutation path from the catalog back into the store. A ref the
//! catalog cannot resolve is skipped by derived views, never treated as an
//! error.

use std::collections::HashMap;

use crate::error::{CoreResult, ValidationError};
use crate::types::{Product, ProductRef};
use crate::validation::validate_product_id;

/// Read-only product lookup.
pub trait Catalog: Send + Sync {
    /// Looks a product up by reference.
    fn resolve(&self, product_ref: &ProductRef) -> Option<&Product>;

    /// Every product, in catalog order.
    fn all(&self) -> &[Product];
}

/// In-memory catalog backed by a fixed product list.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    products: Vec<Product>,
    index: HashMap<ProductRef, usize>,
}

impl StaticCatalog {
    /// Builds a catalog, rejecting empty and duplicate ids.
    pub fn new(products: Vec<Product>) -> CoreResult<Self> {
        let mut index = HashMap::with_capacity(products.len());

        for (position, product) in products.iter().enumerate() {
            validate_product_id(product.id.as_str())?;
            if index.insert(product.id.clone(), position).is_some() {
                return Err(ValidationError::Duplicate {
                    field: "product id".to_string(),
                    value: product.id.to_string(),
                }
                .into());
            }
        }

        Ok(StaticCatalog { products, index })
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Returns true if the catalog has no products.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Catalog for StaticCatalog {
    fn resolve(&self, product_ref: &ProductRef) -> Option<&Product> {
        self.index
            .get(product_ref)
            .and_then(|&position| self.products.get(position))
    }

    fn all(&self) -> &[Product] {
        &self.products
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_resolve_and_order() {
        let catalog = StaticCatalog::new(vec![
            Product::new("b", "Beta", 100),
            Product::new("a", "Alpha", 200),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.resolve(&"a".into()).unwrap().name, "Alpha");
        assert!(catalog.resolve(&"missing".into()).is_none());

        let ids: Vec<_> = catalog.all().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn test_rejects_duplicates_and_empty_ids() {
        let duplicate = StaticCatalog::new(vec![
            Product::new("a", "Alpha", 1),
            Product::new("a", "Alpha again", 2),
        ]);
        assert!(matches!(
            duplicate,
            Err(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));

        let empty = StaticCatalog::new(vec![Product::new("  ", "Nameless", 1)]);
        assert!(matches!(
            empty,
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }
}
