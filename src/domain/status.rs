use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Payment lifecycle status.
///
/// `can_transition_to` is the single source of truth for legal
/// transitions: `Pending` may move to `Completed` or `Failed`; both of
/// those are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(DomainError::validation(
                "status",
                &format!("unknown payment status: {}", other),
            )),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }

    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        match self {
            PaymentStatus::Pending => {
                matches!(target, PaymentStatus::Completed | PaymentStatus::Failed)
            }
            PaymentStatus::Completed | PaymentStatus::Failed => false,
        }
    }

    pub fn validate_transition(&self, target: PaymentStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(target) {
            return Err(DomainError::invalid_transition(
                self.as_str(),
                target.as_str(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
