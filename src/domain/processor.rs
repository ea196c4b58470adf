use super::{Money, Payment, Wallet};
use crate::error::{DomainError, ErrorCode};

/// Why a processing attempt was turned down. These become the payment's
/// `failure_reason` and travel inside `PaymentFailed` events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    UserMismatch,
    CurrencyMismatch,
    InsufficientFunds,
    DebitFailed,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::UserMismatch => "USER_MISMATCH",
            FailureReason::CurrencyMismatch => "CURRENCY_MISMATCH",
            FailureReason::InsufficientFunds => "INSUFFICIENT_FUNDS",
            FailureReason::DebitFailed => "DEBIT_FAILED",
        }
    }
}

/// Outcome of [`Processor::process`].
#[derive(Clone, Debug)]
pub enum ProcessResult {
    Debited {
        previous_balance: Money,
        new_balance: Money,
    },
    Rejected(FailureReason),
}

/// Outcome of [`Processor::refund`].
#[derive(Clone, Debug)]
pub struct RefundResult {
    pub previous_balance: Money,
    pub new_balance: Money,
}

/// Domain service coordinating one payment/wallet step.
///
/// Pure: never persists and never publishes. Rule 1 (payment must be
/// pending) is a hard error: an ineligible payment reaching the
/// processor is a programming error upstream. Rules 2-5 are business
/// rejections carried in the result.
#[derive(Clone, Copy, Debug, Default)]
pub struct Processor;

impl Processor {
    pub fn new() -> Self {
        Processor
    }

    pub fn process(
        &self,
        payment: &Payment,
        wallet: &mut Wallet,
    ) -> Result<ProcessResult, DomainError> {
        if !payment.can_be_processed() {
            return Err(DomainError::new(
                ErrorCode::PaymentNotPending,
                "payment must be in pending status to be processed",
            )
            .with_detail("status", payment.status().as_str()));
        }

        if payment.user_id() != wallet.user_id() {
            return Ok(ProcessResult::Rejected(FailureReason::UserMismatch));
        }

        if !wallet.balance().same_currency(payment.money()) {
            return Ok(ProcessResult::Rejected(FailureReason::CurrencyMismatch));
        }

        if !wallet.can_debit(payment.money()) {
            return Ok(ProcessResult::Rejected(FailureReason::InsufficientFunds));
        }

        match wallet.debit(payment.money()) {
            Ok((previous_balance, new_balance)) => Ok(ProcessResult::Debited {
                previous_balance,
                new_balance,
            }),
            Err(_) => Ok(ProcessResult::Rejected(FailureReason::DebitFailed)),
        }
    }

    pub fn refund(
        &self,
        payment: &Payment,
        wallet: &mut Wallet,
    ) -> Result<RefundResult, DomainError> {
        if !payment.can_be_refunded() {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "payment cannot be refunded in current state",
            )
            .with_detail("status", payment.status().as_str()));
        }

        if payment.user_id() != wallet.user_id() {
            return Err(DomainError::new(
                ErrorCode::UserMismatch,
                "payment and wallet belong to different users",
            ));
        }

        let (previous_balance, new_balance) = wallet.credit(payment.money())?;
        Ok(RefundResult {
            previous_balance,
            new_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Currency, IdempotencyKey, PaymentId, ServiceId, UserId};

    fn ars(s: &str) -> Money {
        Money::from_str(s, Currency::ARS).unwrap()
    }

    fn payment_for(user: &str, amount: &str) -> Payment {
        Payment::new(
            PaymentId::generate(),
            UserId::new(user).unwrap(),
            ServiceId::new("svc-1").unwrap(),
            ars(amount),
            IdempotencyKey::new("key-A").unwrap(),
        )
        .unwrap()
    }

    fn wallet_for(user: &str, balance: Money) -> Wallet {
        Wallet::new(UserId::new(user).unwrap(), balance).unwrap()
    }

    #[test]
    fn process_debits_on_success() {
        let payment = payment_for("user-123", "100.50");
        let mut wallet = wallet_for("user-123", ars("500.00"));

        match Processor::new().process(&payment, &mut wallet).unwrap() {
            ProcessResult::Debited {
                previous_balance,
                new_balance,
            } => {
                assert_eq!(previous_balance, ars("500.00"));
                assert_eq!(new_balance, ars("399.50"));
            }
            other => panic!("expected debit, got {:?}", other),
        }
        assert_eq!(*wallet.balance(), ars("399.50"));
    }

    #[test]
    fn process_rejects_user_mismatch() {
        let payment = payment_for("user-123", "10.00");
        let mut wallet = wallet_for("someone-else", ars("500.00"));

        let result = Processor::new().process(&payment, &mut wallet).unwrap();
        assert!(matches!(
            result,
            ProcessResult::Rejected(FailureReason::UserMismatch)
        ));
        assert_eq!(*wallet.balance(), ars("500.00"));
    }

    #[test]
    fn process_rejects_currency_mismatch() {
        let payment = payment_for("user-123", "10.00");
        let mut wallet = wallet_for(
            "user-123",
            Money::from_str("500.00", Currency::USD).unwrap(),
        );

        let result = Processor::new().process(&payment, &mut wallet).unwrap();
        assert!(matches!(
            result,
            ProcessResult::Rejected(FailureReason::CurrencyMismatch)
        ));
    }

    #[test]
    fn process_rejects_insufficient_funds() {
        let payment = payment_for("user-123", "100.00");
        let mut wallet = wallet_for("user-123", ars("50.00"));

        let result = Processor::new().process(&payment, &mut wallet).unwrap();
        assert!(matches!(
            result,
            ProcessResult::Rejected(FailureReason::InsufficientFunds)
        ));
        assert_eq!(*wallet.balance(), ars("50.00"));
    }

    #[test]
    fn process_hard_fails_on_non_pending_payment() {
        let mut payment = payment_for("user-123", "10.00");
        payment.mark_failed("TIMEOUT").unwrap();
        let mut wallet = wallet_for("user-123", ars("500.00"));

        let err = Processor::new().process(&payment, &mut wallet).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PaymentNotPending);
    }

    #[test]
    fn refund_credits_failed_payment() {
        let mut payment = payment_for("user-123", "100.00");
        payment.mark_failed("GATEWAY_REJECTED").unwrap();
        let mut wallet = wallet_for("user-123", ars("300.00"));

        let result = Processor::new().refund(&payment, &mut wallet).unwrap();
        assert_eq!(result.previous_balance, ars("300.00"));
        assert_eq!(result.new_balance, ars("400.00"));
    }

    #[test]
    fn refund_requires_failed_status() {
        let payment = payment_for("user-123", "100.00");
        let mut wallet = wallet_for("user-123", ars("300.00"));

        let err = Processor::new().refund(&payment, &mut wallet).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);

        let mut completed = payment_for("user-123", "100.00");
        completed.mark_completed("ext-tx-1").unwrap();
        assert!(Processor::new().refund(&completed, &mut wallet).is_err());
    }

    #[test]
    fn refund_requires_matching_user() {
        let mut payment = payment_for("user-123", "100.00");
        payment.mark_failed("TIMEOUT").unwrap();
        let mut wallet = wallet_for("someone-else", ars("300.00"));

        let err = Processor::new().refund(&payment, &mut wallet).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserMismatch);
    }
}
