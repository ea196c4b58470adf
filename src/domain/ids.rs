use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, ErrorCode};

const MAX_ID_LEN: usize = 255;

/// Payment identifier. Always a valid UUID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        if value.is_empty() {
            return Err(DomainError::validation("paymentId", "cannot be empty"));
        }
        let uuid = value.parse::<Uuid>().map_err(|e| {
            DomainError::wrap(
                ErrorCode::ValidationFailed,
                "invalid payment ID format: must be a valid UUID",
                e,
            )
            .with_detail("paymentId", value)
        })?;
        Ok(PaymentId(uuid))
    }

    pub fn generate() -> Self {
        PaymentId(Uuid::new_v4())
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident, $field:literal) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(DomainError::validation($field, "cannot be empty"));
                }
                if value.len() > MAX_ID_LEN {
                    return Err(DomainError::validation($field, "too long (max 255 characters)"));
                }
                Ok($name(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of the wallet-owning user.
    UserId,
    "userId"
);
string_id!(
    /// Identifier of the service being paid for.
    ServiceId,
    "serviceId"
);
string_id!(
    /// Client-supplied token that deduplicates repeated submissions.
    IdempotencyKey,
    "idempotencyKey"
);
