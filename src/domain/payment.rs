use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{IdempotencyKey, Money, PaymentId, PaymentStatus, ServiceId, UserId};
use crate::error::DomainError;

/// Payment aggregate root.
///
/// Created once at intake, mutated only by the coordinator on external
/// gateway responses, never deleted. State transitions go through
/// [`PaymentStatus::validate_transition`]; a completed payment always has
/// an external transaction id and a failed one always has a reason.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    user_id: UserId,
    service_id: ServiceId,
    money: Money,
    idempotency_key: IdempotencyKey,
    status: PaymentStatus,
    failure_reason: Option<String>,
    external_tx_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        id: PaymentId,
        user_id: UserId,
        service_id: ServiceId,
        money: Money,
        idempotency_key: IdempotencyKey,
    ) -> Result<Self, DomainError> {
        if !money.is_positive() {
            return Err(DomainError::validation(
                "amount",
                "payment amount must be greater than zero",
            ));
        }

        let now = Utc::now();
        Ok(Payment {
            id,
            user_id,
            service_id,
            money,
            idempotency_key,
            status: PaymentStatus::Pending,
            failure_reason: None,
            external_tx_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstruct a payment loaded from storage, bypassing creation
    /// invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: PaymentId,
        user_id: UserId,
        service_id: ServiceId,
        money: Money,
        idempotency_key: IdempotencyKey,
        status: PaymentStatus,
        failure_reason: Option<String>,
        external_tx_id: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Payment {
            id,
            user_id,
            service_id,
            money,
            idempotency_key,
            status,
            failure_reason,
            external_tx_id,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    pub fn money(&self) -> &Money {
        &self.money
    }

    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn external_tx_id(&self) -> Option<&str> {
        self.external_tx_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Transition to `Completed`. Legal only from `Pending`; requires the
    /// gateway's transaction id.
    pub fn mark_completed(&mut self, external_tx_id: &str) -> Result<(), DomainError> {
        self.status.validate_transition(PaymentStatus::Completed)?;
        if external_tx_id.is_empty() {
            return Err(DomainError::validation(
                "externalTxId",
                "external transaction ID is required when completing payment",
            ));
        }

        self.status = PaymentStatus::Completed;
        self.external_tx_id = Some(external_tx_id.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transition to `Failed`. Legal only from `Pending`; requires a
    /// reason.
    pub fn mark_failed(&mut self, reason: &str) -> Result<(), DomainError> {
        self.status.validate_transition(PaymentStatus::Failed)?;
        if reason.is_empty() {
            return Err(DomainError::validation(
                "failureReason",
                "reason is required when failing payment",
            ));
        }

        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn can_be_processed(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    /// Only failed payments are refunded; a completed payment is out of
    /// refund scope for this core.
    pub fn can_be_refunded(&self) -> bool {
        self.status == PaymentStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;
    use crate::error::ErrorCode;

    fn pending() -> Payment {
        Payment::new(
            PaymentId::generate(),
            UserId::new("user-123").unwrap(),
            ServiceId::new("svc-1").unwrap(),
            Money::from_str("100.50", Currency::ARS).unwrap(),
            IdempotencyKey::new("key-A").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn new_payment_is_pending() {
        let payment = pending();
        assert_eq!(payment.status(), PaymentStatus::Pending);
        assert!(payment.can_be_processed());
        assert!(!payment.can_be_refunded());
        assert_eq!(payment.created_at(), payment.updated_at());
    }

    #[test]
    fn rejects_zero_amount() {
        let err = Payment::new(
            PaymentId::generate(),
            UserId::new("user-123").unwrap(),
            ServiceId::new("svc-1").unwrap(),
            Money::zero(Currency::ARS),
            IdempotencyKey::new("key-A").unwrap(),
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
    }

    #[test]
    fn mark_completed_sets_tx_id() {
        let mut payment = pending();
        payment.mark_completed("ext-tx-1").unwrap();
        assert_eq!(payment.status(), PaymentStatus::Completed);
        assert_eq!(payment.external_tx_id(), Some("ext-tx-1"));
    }

    #[test]
    fn mark_completed_requires_tx_id() {
        let mut payment = pending();
        assert!(payment.mark_completed("").is_err());
        assert_eq!(payment.status(), PaymentStatus::Pending);
    }

    #[test]
    fn mark_failed_sets_reason_and_enables_refund() {
        let mut payment = pending();
        payment.mark_failed("GATEWAY_REJECTED").unwrap();
        assert_eq!(payment.status(), PaymentStatus::Failed);
        assert_eq!(payment.failure_reason(), Some("GATEWAY_REJECTED"));
        assert!(payment.can_be_refunded());
        assert!(!payment.can_be_processed());
    }

    #[test]
    fn mark_failed_requires_reason() {
        let mut payment = pending();
        assert!(payment.mark_failed("").is_err());
    }

    #[test]
    fn terminal_payments_reject_further_transitions() {
        let mut payment = pending();
        payment.mark_completed("ext-tx-1").unwrap();
        let err = payment.mark_failed("too late").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);

        let mut payment = pending();
        payment.mark_failed("TIMEOUT").unwrap();
        assert!(payment.mark_completed("ext-tx-2").is_err());
    }

    #[test]
    fn from_parts_bypasses_invariants() {
        let now = Utc::now();
        let loaded = Payment::from_parts(
            PaymentId::generate(),
            UserId::new("user-123").unwrap(),
            ServiceId::new("svc-1").unwrap(),
            Money::zero(Currency::ARS),
            IdempotencyKey::new("key-A").unwrap(),
            PaymentStatus::Failed,
            Some("TIMEOUT".to_string()),
            None,
            now,
            now,
        );
        assert_eq!(loaded.status(), PaymentStatus::Failed);
        assert!(loaded.money().is_zero());
    }
}
