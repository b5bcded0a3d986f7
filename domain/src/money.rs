//! Fixed-precision monetary amounts tagged with a 3-letter currency code.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ISO-4217-shaped 3-letter currency tag (not validated against the ISO list;
/// validation of specific codes is a gateway/booking-service concern, not a
/// domain-type concern).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency([u8; 3]);

impl Currency {
    /// US Dollar, the only currency exercised end-to-end in this codebase's tests.
    pub const USD: Self = Self([b'U', b'S', b'D']);

    /// Build a currency tag from a 3-letter ASCII code (e.g. `"USD"`).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::InvalidCurrencyCode`] unless `code` is exactly
    /// 3 ASCII letters.
    pub fn new(code: &str) -> Result<Self, MoneyError> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.is_ascii() || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(MoneyError::InvalidCurrencyCode(code.to_string()));
        }
        Ok(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }

    /// Returns the currency code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // SAFETY-free: constructed only from ASCII bytes in `new`/`USD`.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A monetary amount paired with its currency.
///
/// Amounts use `rust_decimal::Decimal` rather than a float to avoid rounding
/// drift across the sum-of-items invariant (I-4 in the data model).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Construct a new `Money` value.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// The numeric amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    /// The currency tag.
    #[must_use]
    pub const fn currency(&self) -> Currency {
        self.currency
    }

    /// Add two amounts of the same currency.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] if the currencies differ.
    pub fn checked_add(&self, other: Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                lhs: self.currency,
                rhs: other.currency,
            });
        }
        Ok(Self::new(self.amount + other.amount, self.currency))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// Errors from money arithmetic.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Attempted to combine amounts in two different currencies.
    #[error("currency mismatch: {lhs} vs {rhs}")]
    CurrencyMismatch { lhs: Currency, rhs: Currency },

    /// A currency code was not exactly 3 ASCII letters.
    #[error("invalid currency code: {0:?}")]
    InvalidCurrencyCode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    #[allow(clippy::expect_used)] // Panics: test will fail if the add itself is wrong
    fn sums_same_currency() {
        let a = Money::new(dec!(100.00), Currency::USD);
        let b = Money::new(dec!(50.00), Currency::USD);
        let total = a.checked_add(b).expect("same currency");
        assert_eq!(total.amount(), dec!(150.00));
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test will fail if the currency code is rejected
    fn rejects_mixed_currency() {
        let a = Money::new(dec!(100.00), Currency::USD);
        let b = Money::new(dec!(50.00), Currency::new("EUR").expect("valid code"));
        assert!(a.checked_add(b).is_err());
    }

    #[test]
    fn displays_amount_and_currency() {
        let m = Money::new(dec!(19.99), Currency::USD);
        assert_eq!(m.to_string(), "19.99 USD");
    }
}
