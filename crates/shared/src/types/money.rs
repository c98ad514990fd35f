//! Money type with decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal` for arbitrary precision.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Represents a monetary amount with currency.
///
/// Uses `Decimal` internally to avoid floating-point precision errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount in major currency units.
    pub amount: Decimal,
    /// ISO 4217 currency code (e.g., "USD", "EGP").
    pub currency: Currency,
}

/// ISO 4217 currency codes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// Egyptian Pound
    Egp,
    /// Saudi Riyal
    Sar,
    /// UAE Dirham
    Aed,
}

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Adds another amount of the same currency.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` if the currencies differ.
    pub fn try_add(self, other: Self) -> Result<Self, CurrencyMismatch> {
        if self.currency != other.currency {
            return Err(CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    /// Subtracts another amount of the same currency.
    ///
    /// # Errors
    ///
    /// Returns `CurrencyMismatch` if the currencies differ.
    pub fn try_sub(self, other: Self) -> Result<Self, CurrencyMismatch> {
        if self.currency != other.currency {
            return Err(CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(Self::new(self.amount - other.amount, self.currency))
    }
}

/// Error for arithmetic on amounts of different currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Currency mismatch: {left} vs {right}")]
pub struct CurrencyMismatch {
    /// Currency on the left-hand side.
    pub left: Currency,
    /// Currency on the right-hand side.
    pub right: Currency,
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usd => write!(f, "USD"),
            Self::Eur => write!(f, "EUR"),
            Self::Egp => write!(f, "EGP"),
            Self::Sar => write!(f, "SAR"),
            Self::Aed => write!(f, "AED"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "EGP" => Ok(Self::Egp),
            "SAR" => Ok(Self::Sar),
            "AED" => Ok(Self::Aed),
            other => Err(format!("Unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_is_zero() {
        let m = Money::zero(Currency::Usd);
        assert!(m.is_zero());
        assert!(!m.is_negative());
    }

    #[test]
    fn test_try_add_same_currency() {
        let a = Money::new(dec!(100.50), Currency::Egp);
        let b = Money::new(dec!(49.50), Currency::Egp);
        assert_eq!(a.try_add(b).unwrap().amount, dec!(150.00));
    }

    #[test]
    fn test_try_add_currency_mismatch() {
        let a = Money::new(dec!(100), Currency::Usd);
        let b = Money::new(dec!(100), Currency::Eur);
        assert!(a.try_add(b).is_err());
    }

    #[test]
    fn test_try_sub_can_go_negative() {
        let a = Money::new(dec!(10), Currency::Usd);
        let b = Money::new(dec!(25), Currency::Usd);
        let diff = a.try_sub(b).unwrap();
        assert!(diff.is_negative());
        assert_eq!(diff.amount, dec!(-15));
    }

    #[test]
    fn test_currency_round_trip() {
        for code in ["USD", "EUR", "EGP", "SAR", "AED"] {
            let c: Currency = code.parse().unwrap();
            assert_eq!(c.to_string(), code);
        }
        assert!("XXX".parse::<Currency>().is_err());
    }
}
