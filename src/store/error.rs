use std::fmt;

use crate::error::{DomainError, ErrorCode};

/// Errors from the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    LockPoisoned(&'static str),
    /// Conditional wallet write lost the race: the stored version no
    /// longer matches what the caller loaded.
    VersionConflict {
        user_id: String,
        expected: u64,
        actual: u64,
    },
    /// Append rejected: `(payment_id, event_id)` already present.
    DuplicateEvent {
        payment_id: String,
        event_id: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::LockPoisoned(operation) => {
                write!(f, "store lock poisoned during {}", operation)
            }
            StoreError::VersionConflict {
                user_id,
                expected,
                actual,
            } => write!(
                f,
                "concurrent write detected for wallet {} (expected version {}, got {})",
                user_id, expected, actual
            ),
            StoreError::DuplicateEvent {
                payment_id,
                event_id,
            } => write!(
                f,
                "event {} already appended for payment {}",
                event_id, payment_id
            ),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        DomainError::wrap(ErrorCode::DatabaseError, "store operation failed", err)
    }
}
