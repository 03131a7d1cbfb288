//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are stored in the currency's standard unit (rupees, dollars) as a
//! [`Decimal`] so that arithmetic never drifts. Payment gateways want integer
//! minor units (paise, cents); use [`Price::to_minor_units`] at that boundary.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors that can occur during price arithmetic and conversion.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is negative where only non-negative amounts are allowed.
    #[error("price cannot be negative")]
    Negative,
    /// The amount has more than two decimal places.
    #[error("price cannot have more than 2 decimal places")]
    TooPrecise,
    /// The amount does not fit into the target integer representation.
    #[error("price is out of range")]
    Overflow,
    /// Two prices in different currencies were combined.
    #[error("currency mismatch: {0} vs {1}")]
    CurrencyMismatch(CurrencyCode, CurrencyCode),
    /// Unknown ISO 4217 code.
    #[error("unsupported currency: {0}")]
    UnknownCurrency(String),
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
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

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Build a price from integer minor units (e.g., paise).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(minor, 2), currency_code)
    }

    /// Convert to integer minor units for payment gateways.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` for negative amounts,
    /// `PriceError::TooPrecise` when the amount has sub-minor-unit precision,
    /// and `PriceError::Overflow` when it does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative);
        }
        if self.amount.normalize().scale() > 2 {
            return Err(PriceError::TooPrecise);
        }
        self.amount
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|minor| minor.to_i64())
            .ok_or(PriceError::Overflow)
    }

    /// Multiply by a quantity (line totals).
    #[must_use]
    pub fn checked_mul(&self, quantity: u32) -> Option<Self> {
        self.amount
            .checked_mul(Decimal::from(quantity))
            .map(|amount| Self::new(amount, self.currency_code))
    }

    /// Add two prices of the same currency.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::CurrencyMismatch` when currencies differ and
    /// `PriceError::Overflow` if the sum overflows.
    pub fn checked_add(&self, other: &Self) -> Result<Self, PriceError> {
        if self.currency_code != other.currency_code {
            return Err(PriceError::CurrencyMismatch(
                self.currency_code,
                other.currency_code,
            ));
        }
        self.amount
            .checked_add(other.amount)
            .map(|amount| Self::new(amount, self.currency_code))
            .ok_or(PriceError::Overflow)
    }

    /// Whether the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", self.currency_code.symbol(), self.amount)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    #[default]
    Inr,
    Usd,
    Eur,
    Gbp,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Inr => "₹",
            Self::Usd => "$",
            Self::Eur => "€",
            Self::Gbp => "£",
        }
    }

    /// ISO 4217 code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Inr => "INR",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::Inr),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            other => Err(PriceError::UnknownCurrency(other.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn inr(s: &str) -> Price {
        Price::new(Decimal::from_str(s).unwrap(), CurrencyCode::Inr)
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(inr("1299.00").to_minor_units().unwrap(), 129_900);
        assert_eq!(inr("0.5").to_minor_units().unwrap(), 50);
        assert_eq!(inr("0").to_minor_units().unwrap(), 0);
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        assert_eq!(inr("-1.00").to_minor_units(), Err(PriceError::Negative));
    }

    #[test]
    fn test_to_minor_units_rejects_sub_paise() {
        assert_eq!(inr("10.005").to_minor_units(), Err(PriceError::TooPrecise));
        // Trailing zeros beyond two places are fine.
        assert_eq!(inr("10.5000").to_minor_units().unwrap(), 1050);
    }

    #[test]
    fn test_from_minor_units() {
        let price = Price::from_minor_units(129_950, CurrencyCode::Inr);
        assert_eq!(price.amount, Decimal::from_str("1299.50").unwrap());
    }

    #[test]
    fn test_checked_mul() {
        let line = inr("499.50").checked_mul(3).unwrap();
        assert_eq!(line.amount, Decimal::from_str("1498.50").unwrap());
    }

    #[test]
    fn test_checked_add_same_currency() {
        let total = inr("100.10").checked_add(&inr("0.90")).unwrap();
        assert_eq!(total.amount, Decimal::from_str("101.00").unwrap());
    }

    #[test]
    fn test_checked_add_currency_mismatch() {
        let usd = Price::new(Decimal::ONE, CurrencyCode::Usd);
        assert!(matches!(
            inr("1").checked_add(&usd),
            Err(PriceError::CurrencyMismatch(CurrencyCode::Inr, CurrencyCode::Usd))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(inr("1299").to_string(), "₹1299.00");
        assert_eq!(
            Price::new(Decimal::from_str("5.5").unwrap(), CurrencyCode::Usd).to_string(),
            "$5.50"
        );
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!(CurrencyCode::from_str("inr").unwrap(), CurrencyCode::Inr);
        assert_eq!(CurrencyCode::from_str(" GBP ").unwrap(), CurrencyCode::Gbp);
        assert!(CurrencyCode::from_str("JPY").is_err());
    }

    #[test]
    fn test_currency_serde_uppercase() {
        assert_eq!(
            serde_json::to_string(&CurrencyCode::Inr).unwrap(),
            "\"INR\""
        );
    }
}
