//! # Money Module
//!
//! Provides the `Money` type used to price catalog products and total up the
//! acquisition ledger.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Catalog price: 1999 cents ($19.99)                                     │
//! │  Ledger quantity: 3                                                     │
//! │                                                                         │
//! │  Float:   19.99 * 3 = 59.970000000000006   ❌                           │
//! │  Integer: 1999 * 3  = 5997 cents ($59.97)  ✅                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use vitrine_core::money::Money;
//!
//! let price = Money::from_cents(1999);
//! let spent: Money = [price * 3, Money::from_cents(500)].into_iter().sum();
//! assert_eq!(spent.cents(), 6497);
//! assert_eq!(spent.to_string(), "$64.97");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so that a misconfigured catalog (negative price) still sums
/// predictably instead of wrapping.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies a unit price by a ledger quantity.
    ///
    /// Saturates instead of overflowing; a ledger would need billions of
    /// units of a premium product to get there.
    #[inline]
    pub const fn times(&self, quantity: u32) -> Self {
        Money(self.0.saturating_mul(quantity as i64))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display (`$12.34`, `-$0.50`). Localised formatting is the
/// frontend's job.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// Multiplication by a ledger quantity.
impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, quantity: u32) -> Self {
        self.times(quantity)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "$10.99");
        assert_eq!(Money::from_cents(500).to_string(), "$5.00");
        assert_eq!(Money::from_cents(-50).to_string(), "-$0.50");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }

    #[test]
    fn test_quantity_multiplication() {
        let unit = Money::from_cents(1999);
        assert_eq!((unit * 3).cents(), 5997);
        assert_eq!(unit.times(0), Money::zero());
    }

    #[test]
    fn test_sum_of_empty_is_zero() {
        let total: Money = std::iter::empty().sum();
        assert!(total.is_zero());
    }

    #[test]
    fn test_saturating_arithmetic() {
        let huge = Money::from_cents(i64::MAX);
        assert_eq!((huge + Money::from_cents(1)).cents(), i64::MAX);
        assert_eq!(huge.times(2).cents(), i64::MAX);
    }
}
