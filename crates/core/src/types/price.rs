//! Type-safe price representation using decimal arithmetic.
//!
//! Catalog prices are denormalized onto cart lines when a line is added,
//! so a `Price` is a snapshot, not a live catalog lookup.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rand, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price in South African Rand, the storefront's currency.
    #[must_use]
    pub const fn zar(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::ZAR)
    }

    /// Whether the amount is below zero. Cart lines reject negative prices.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Format for display (e.g., "R49.99").
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency_code.symbol(), self.amount)
    }
}

impl Default for Price {
    /// Zero rand, the placeholder for documents missing a price snapshot.
    fn default() -> Self {
        Self::zar(Decimal::ZERO)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    ZAR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Currency symbol for display.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::ZAR => "R",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// ISO 4217 code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ZAR => "ZAR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cents(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn test_display_formats_two_decimals() {
        assert_eq!(Price::zar(cents(4999)).display(), "R49.99");
        assert_eq!(Price::zar(Decimal::from(5)).display(), "R5.00");
        assert_eq!(
            Price::new(cents(1250), CurrencyCode::USD).display(),
            "$12.50"
        );
    }

    #[test]
    fn test_negative_detection() {
        assert!(Price::zar(cents(-1)).is_negative());
        assert!(!Price::zar(Decimal::ZERO).is_negative());
        assert!(!Price::zar(Decimal::from(10)).is_negative());
    }
}
