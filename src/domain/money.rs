use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Currency;
use crate::error::{DomainError, ErrorCode};

/// An exact-decimal amount in a single currency.
///
/// Immutable value object. All arithmetic requires identical currencies
/// and never produces a negative amount. Floating point only ever appears
/// at the wire boundary (see the event codec); internally everything is
/// `rust_decimal::Decimal`.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Result<Self, DomainError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::new(
                ErrorCode::InvalidAmount,
                "amount cannot be negative",
            )
            .with_detail("amount", amount.to_string()));
        }
        Ok(Money { amount, currency })
    }

    /// Parse an amount from its decimal string form, e.g. `"100.50"`.
    pub fn from_str(amount: &str, currency: Currency) -> Result<Self, DomainError> {
        let dec: Decimal = amount.parse().map_err(|e| {
            DomainError::wrap(ErrorCode::InvalidAmount, "invalid amount format", e)
                .with_detail("amount", amount)
        })?;
        Money::new(dec, currency)
    }

    /// Convert from an f64 arriving at the serialization boundary.
    pub fn from_f64(amount: f64, currency: Currency) -> Result<Self, DomainError> {
        let dec = Decimal::try_from(amount).map_err(|e| {
            DomainError::wrap(ErrorCode::InvalidAmount, "amount is not representable", e)
                .with_detail("amount", amount.to_string())
        })?;
        Money::new(dec, currency)
    }

    pub fn zero(currency: Currency) -> Self {
        Money {
            amount: Decimal::ZERO,
            currency,
        }
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Lossy conversion for the wire; never used for comparisons.
    pub fn amount_f64(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        self.amount.to_f64().unwrap_or(0.0)
    }

    pub fn add(&self, other: &Money) -> Result<Money, DomainError> {
        self.require_same_currency(other, "add")?;
        Ok(Money {
            amount: self.amount + other.amount,
            currency: self.currency,
        })
    }

    pub fn subtract(&self, other: &Money) -> Result<Money, DomainError> {
        self.require_same_currency(other, "subtract")?;
        let result = self.amount - other.amount;
        if result.is_sign_negative() && !result.is_zero() {
            return Err(DomainError::new(
                ErrorCode::InvalidAmount,
                "result would be negative",
            ));
        }
        Ok(Money {
            amount: result,
            currency: self.currency,
        })
    }

    pub fn gte(&self, other: &Money) -> Result<bool, DomainError> {
        self.require_same_currency(other, "compare")?;
        Ok(self.amount >= other.amount)
    }

    pub fn gt(&self, other: &Money) -> Result<bool, DomainError> {
        self.require_same_currency(other, "compare")?;
        Ok(self.amount > other.amount)
    }

    pub fn lt(&self, other: &Money) -> Result<bool, DomainError> {
        self.require_same_currency(other, "compare")?;
        Ok(self.amount < other.amount)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }

    fn require_same_currency(&self, other: &Money, op: &str) -> Result<(), DomainError> {
        if self.currency != other.currency {
            return Err(DomainError::new(
                ErrorCode::CurrencyMismatch,
                format!(
                    "cannot {} different currencies: {} and {}",
                    op, self.currency, other.currency
                ),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

impl fmt::Debug for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Money({} {})", self.amount, self.currency)
    }
}
