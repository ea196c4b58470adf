use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Money, UserId};
use crate::error::{DomainError, ErrorCode};

/// Wallet aggregate root, owner of a user's balance.
///
/// The balance currency is pinned at creation and never changes; the
/// balance itself never goes negative. Mutation happens only through
/// [`Wallet::debit`] and [`Wallet::credit`], both in-memory; persistence
/// is the caller's job.
///
/// `version` counts persisted writes. The wallet is the one hot row in
/// the system, so repository updates are conditional on it (see
/// `WalletRepository::update`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Wallet {
    user_id: UserId,
    balance: Money,
    version: u64,
    updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: UserId, initial_balance: Money) -> Result<Self, DomainError> {
        // Money already forbids negative amounts; zero is a valid start.
        Ok(Wallet {
            user_id,
            balance: initial_balance,
            version: 0,
            updated_at: Utc::now(),
        })
    }

    /// Reconstruct a wallet loaded from storage.
    pub fn from_parts(
        user_id: UserId,
        balance: Money,
        version: u64,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Wallet {
            user_id,
            balance,
            version,
            updated_at,
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn balance(&self) -> &Money {
        &self.balance
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Currency matches and the balance covers the amount.
    pub fn can_debit(&self, amount: &Money) -> bool {
        self.balance.same_currency(amount) && self.balance.gte(amount).unwrap_or(false)
    }

    /// Remove funds. Returns `(previous_balance, new_balance)`.
    pub fn debit(&mut self, amount: &Money) -> Result<(Money, Money), DomainError> {
        if !self.balance.same_currency(amount) {
            return Err(DomainError::currency_mismatch(
                self.balance.currency().code(),
                amount.currency().code(),
            ));
        }
        if !self.can_debit(amount) {
            return Err(DomainError::insufficient_funds(
                amount.to_string(),
                self.balance.to_string(),
            ));
        }

        let previous = self.balance;
        self.balance = self.balance.subtract(amount)?;
        self.updated_at = Utc::now();
        Ok((previous, self.balance))
    }

    /// Add funds. The amount must be strictly positive and in the
    /// wallet's currency. Returns `(previous_balance, new_balance)`.
    pub fn credit(&mut self, amount: &Money) -> Result<(Money, Money), DomainError> {
        if !self.balance.same_currency(amount) {
            return Err(DomainError::currency_mismatch(
                self.balance.currency().code(),
                amount.currency().code(),
            ));
        }
        if !amount.is_positive() {
            return Err(DomainError::new(
                ErrorCode::InvalidAmount,
                "credit amount must be positive",
            ));
        }

        let previous = self.balance;
        self.balance = self.balance.add(amount)?;
        self.updated_at = Utc::now();
        Ok((previous, self.balance))
    }

    /// Would the balance still cover `minimum` after normal operation.
    pub fn has_minimum_balance(&self, minimum: &Money) -> Result<bool, DomainError> {
        if !self.balance.same_currency(minimum) {
            return Err(DomainError::currency_mismatch(
                self.balance.currency().code(),
                minimum.currency().code(),
            ));
        }
        self.balance.gte(minimum)
    }

    /// Called by the repository after a successful conditional write.
    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }
}
