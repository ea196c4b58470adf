use std::collections::HashMap;
use std::error::Error;
use std::fmt;

/// Typed error codes, grouped by domain.
///
/// Business codes become terminal `PaymentFailed` events inside the
/// coordinator; infrastructure codes are retryable via bus redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Validation
    ValidationFailed,
    InvalidAmount,
    InvalidCurrency,
    InvalidStateTransition,

    // Business
    InsufficientFunds,
    CurrencyMismatch,
    UserMismatch,
    WalletNotFound,
    PaymentNotFound,
    PaymentNotPending,

    // Idempotency
    DuplicateRequest,

    // Infrastructure
    DatabaseError,
    EventPublishError,
    EventStoreError,

    // External
    ExternalGatewayError,
    ExternalTimeout,

    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::InvalidCurrency => "INVALID_CURRENCY",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorCode::CurrencyMismatch => "CURRENCY_MISMATCH",
            ErrorCode::UserMismatch => "USER_MISMATCH",
            ErrorCode::WalletNotFound => "WALLET_NOT_FOUND",
            ErrorCode::PaymentNotFound => "PAYMENT_NOT_FOUND",
            ErrorCode::PaymentNotPending => "PAYMENT_NOT_PENDING",
            ErrorCode::DuplicateRequest => "DUPLICATE_REQUEST",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::EventPublishError => "EVENT_PUBLISH_ERROR",
            ErrorCode::EventStoreError => "EVENT_STORE_ERROR",
            ErrorCode::ExternalGatewayError => "EXTERNAL_GATEWAY_ERROR",
            ErrorCode::ExternalTimeout => "EXTERNAL_TIMEOUT",
            ErrorCode::Internal => "INTERNAL_ERROR",
        }
    }

    /// Whether a handler failing with this code should be retried by the
    /// bus (message returned to the queue) rather than surfaced.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::DatabaseError | ErrorCode::EventPublishError | ErrorCode::EventStoreError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured domain error: a stable code, a human message, an optional
/// cause for chaining, and a detail map for structured context.
#[derive(Debug)]
pub struct DomainError {
    code: ErrorCode,
    message: String,
    cause: Option<Box<dyn Error + Send + Sync>>,
    details: HashMap<String, String>,
}

impl DomainError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        DomainError {
            code,
            message: message.into(),
            cause: None,
            details: HashMap::new(),
        }
    }

    /// Wrap an underlying error with a domain code and message.
    pub fn wrap(
        code: ErrorCode,
        message: impl Into<String>,
        cause: impl Error + Send + Sync + 'static,
    ) -> Self {
        DomainError {
            code,
            message: message.into(),
            cause: Some(Box::new(cause)),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> &HashMap<String, String> {
        &self.details
    }

    // Constructors for the common cases.

    pub fn validation(field: &str, reason: &str) -> Self {
        DomainError::new(
            ErrorCode::ValidationFailed,
            format!("validation failed for {}: {}", field, reason),
        )
        .with_detail("field", field)
        .with_detail("reason", reason)
    }

    pub fn insufficient_funds(required: impl Into<String>, available: impl Into<String>) -> Self {
        DomainError::new(ErrorCode::InsufficientFunds, "insufficient funds in wallet")
            .with_detail("required", required)
            .with_detail("available", available)
    }

    pub fn wallet_not_found(user_id: &str) -> Self {
        DomainError::new(
            ErrorCode::WalletNotFound,
            format!("wallet not found for user: {}", user_id),
        )
        .with_detail("userId", user_id)
    }

    pub fn payment_not_found(payment_id: &str) -> Self {
        DomainError::new(
            ErrorCode::PaymentNotFound,
            format!("payment not found: {}", payment_id),
        )
        .with_detail("paymentId", payment_id)
    }

    pub fn currency_mismatch(expected: &str, actual: &str) -> Self {
        DomainError::new(
            ErrorCode::CurrencyMismatch,
            format!("currency mismatch: expected {} but got {}", expected, actual),
        )
        .with_detail("expected", expected)
        .with_detail("actual", actual)
    }

    pub fn invalid_transition(from: &str, to: &str) -> Self {
        DomainError::new(
            ErrorCode::InvalidStateTransition,
            format!("invalid status transition from {} to {}", from, to),
        )
        .with_detail("fromStatus", from)
        .with_detail("toStatus", to)
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "[{}] {} (caused by: {})", self.code, self.message, cause),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

impl Error for DomainError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_cause() {
        let err = DomainError::new(ErrorCode::InsufficientFunds, "not enough money");
        assert_eq!(err.to_string(), "[INSUFFICIENT_FUNDS] not enough money");
    }

    #[test]
    fn display_with_cause() {
        let io = std::io::Error::other("disk on fire");
        let err = DomainError::wrap(ErrorCode::DatabaseError, "update failed", io);
        assert_eq!(
            err.to_string(),
            "[DATABASE_ERROR] update failed (caused by: disk on fire)"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn details_accumulate() {
        let err = DomainError::insufficient_funds("100.00 ARS", "50.00 ARS");
        assert_eq!(err.details().get("required").unwrap(), "100.00 ARS");
        assert_eq!(err.details().get("available").unwrap(), "50.00 ARS");
    }

    #[test]
    fn retryable_codes() {
        assert!(ErrorCode::DatabaseError.is_retryable());
        assert!(ErrorCode::EventStoreError.is_retryable());
        assert!(!ErrorCode::InsufficientFunds.is_retryable());
        assert!(!ErrorCode::ValidationFailed.is_retryable());
    }
}
