//! Money value object in BRL minor units.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A non-negative BRL amount stored as centavos.
///
/// Providers speak decimals (Asaas `value`) or cents (Stripe `unit_amount`);
/// both convert through here so rounding happens in one place.
/// Serialized as a decimal number, matching what clients already expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    /// Creates an amount from centavos.
    pub fn from_cents(cents: i64) -> Result<Self, ValidationError> {
        if cents < 0 {
            return Err(ValidationError::invalid_format(
                "amount",
                "amount cannot be negative",
            ));
        }
        Ok(Self(cents))
    }

    /// Creates an amount from a decimal value, rounding to the nearest centavo.
    pub fn from_decimal(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::invalid_format(
                "amount",
                "amount must be a finite number",
            ));
        }
        let cents = (value * 100.0).round();
        if cents > i64::MAX as f64 {
            return Err(ValidationError::invalid_format("amount", "amount too large"));
        }
        Self::from_cents(cents as i64)
    }

    /// Amount in centavos.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Amount as a decimal number of reais.
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> Self {
        money.as_decimal()
    }
}

impl TryFrom<f64> for Money {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Money::from_decimal(value)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R$ {}.{:02}", self.0 / 100, self.0 % 100)
    }
}
