//! Value Objects for the campus marketplace

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Minor-unit precision used for every amount (pesewas for GHS).
pub const MONEY_SCALE: u32 = 2;

/// Money value object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self { amount, currency: currency.to_uppercase() }
    }
    pub fn ghs(amount: Decimal) -> Self { Self::new(amount, "GHS") }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_zero(&self) -> bool { self.amount.is_zero() }
    pub fn is_negative(&self) -> bool { self.amount.is_sign_negative() && !self.amount.is_zero() }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        self.same_currency(other)?;
        Ok(Money::new(self.amount - other.amount, &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money {
        Money::new(self.amount * Decimal::from(qty), &self.currency)
    }

    /// Half of the amount, rounded up to the minor unit.
    pub fn half_rounded_up(&self) -> Money {
        let half = (self.amount * Decimal::new(5, 1))
            .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToPositiveInfinity);
        Money::new(half, &self.currency)
    }

    /// True when the amount carries no precision below the minor unit.
    pub fn is_minor_unit_exact(&self) -> bool {
        self.amount.round_dp(MONEY_SCALE) == self.amount
    }

    fn same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl Default for Money { fn default() -> Self { Self::zero("GHS") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shown = self.amount;
        shown.rescale(MONEY_SCALE);
        write!(f, "{} {}", self.currency, shown)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
}

/// Delivery-area code used to route orders to riders, e.g. `NORTH-HALLS`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CampusZone(String);

impl CampusZone {
    pub fn new(value: impl Into<String>) -> Result<Self, ZoneError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(ZoneError::Empty); }
        if value.len() > 32 { return Err(ZoneError::TooLong); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(ZoneError::InvalidCharacter);
        }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CampusZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CampusZone {
    type Error = ZoneError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CampusZone> for String {
    fn from(zone: CampusZone) -> Self { zone.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZoneError {
    #[error("campus zone is empty")]
    Empty,
    #[error("campus zone is longer than 32 characters")]
    TooLong,
    #[error("campus zone may only contain letters, digits, '-' and '_'")]
    InvalidCharacter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_normalised() {
        let zone = CampusZone::new(" north-halls ").unwrap();
        assert_eq!(zone.as_str(), "NORTH-HALLS");
        assert_eq!(CampusZone::new("   "), Err(ZoneError::Empty));
        assert_eq!(CampusZone::new("a b"), Err(ZoneError::InvalidCharacter));
    }

    #[test]
    fn test_money_add() {
        let a = Money::ghs(Decimal::new(100, 0));
        let b = Money::ghs(Decimal::new(50, 0));
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150, 0));
        assert!(a.add(&Money::new(Decimal::ONE, "USD")).is_err());
    }

    #[test]
    fn test_half_rounds_up_to_pesewa() {
        assert_eq!(Money::ghs(Decimal::new(9999, 2)).half_rounded_up().amount(), Decimal::new(5000, 2));
        assert_eq!(Money::ghs(Decimal::new(10000, 2)).half_rounded_up().amount(), Decimal::new(50, 0));
        assert_eq!(Money::ghs(Decimal::new(1, 2)).half_rounded_up().amount(), Decimal::new(1, 2));
    }

    #[test]
    fn test_display_uses_minor_units() {
        assert_eq!(Money::ghs(Decimal::new(5, 0)).to_string(), "GHS 5.00");
    }
}
