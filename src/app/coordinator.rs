use std::sync::Arc;

use super::{append_and_publish, republish};
use crate::bus::Publisher;
use crate::domain::{Payment, PaymentId, PaymentStatus, ProcessResult, Processor};
use crate::error::{DomainError, ErrorCode};
use crate::event::{
    EventHeader, EventMetadata, ExternalPaymentRequested as ExternalPaymentRequestedEvent,
    PaymentCompleted, PaymentEvent, PaymentFailed, PaymentRefundRequested, WalletCredited,
    WalletDebited,
};
use crate::store::{EventStore, PaymentRepository, StoreError, StoredEvent, WalletRepository};

const REFUND_CREDIT_REASON: &str = "REFUND";
const TIMEOUT_REASON: &str = "TIMEOUT";
const WALLET_NOT_FOUND_REASON: &str = "WALLET_NOT_FOUND";

/// Saga coordinator: consumes events, drives the payment state machine,
/// and emits follow-up events.
///
/// Every handler is idempotent. The bus is at-least-once and gives no
/// per-payment ordering, so each handler re-checks the payment's status
/// and the event log before acting: replays become no-ops, early
/// arrivals become retryable errors, and partial progress (persisted
/// aggregate but missing log entry, or logged event but failed publish)
/// is resumed on the next delivery.
pub struct PaymentCoordinator {
    payment_repo: Arc<dyn PaymentRepository>,
    wallet_repo: Arc<dyn WalletRepository>,
    event_store: Arc<dyn EventStore>,
    publisher: Arc<dyn Publisher>,
    processor: Processor,
    max_wallet_retries: u32,
}

impl PaymentCoordinator {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        wallet_repo: Arc<dyn WalletRepository>,
        event_store: Arc<dyn EventStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        PaymentCoordinator {
            payment_repo,
            wallet_repo,
            event_store,
            publisher,
            processor: Processor::new(),
            max_wallet_retries: 5,
        }
    }

    /// Bound on reload-and-retry rounds when a conditional wallet write
    /// loses to a concurrent payment.
    pub fn with_max_wallet_retries(mut self, retries: u32) -> Self {
        self.max_wallet_retries = retries;
        self
    }

    /// Handler for the payment queue: the payment lifecycle events.
    /// Event types the queue receives but this coordinator does not
    /// recognize are acknowledged and dropped.
    pub fn handle_payment_queue_event(&self, event: &PaymentEvent) -> Result<(), DomainError> {
        match event {
            PaymentEvent::PaymentRequested(e) => self.on_payment_requested(e),
            PaymentEvent::ExternalPaymentSucceeded(e) => self.on_external_succeeded(e),
            PaymentEvent::ExternalPaymentFailed(e) => {
                self.initiate_refund(e.payment_id, &e.reason, &e.header.metadata)
            }
            PaymentEvent::ExternalPaymentTimeout(e) => {
                self.initiate_refund(e.payment_id, TIMEOUT_REASON, &e.header.metadata)
            }
            other => {
                tracing::debug!(event_type = other.event_type(), "ignoring event on payment queue");
                Ok(())
            }
        }
    }

    /// Handler for the wallet queue: compensation requests.
    pub fn handle_wallet_queue_event(&self, event: &PaymentEvent) -> Result<(), DomainError> {
        match event {
            PaymentEvent::PaymentRefundRequested(e) => self.on_refund_requested(e),
            other => {
                tracing::debug!(event_type = other.event_type(), "ignoring event on wallet queue");
                Ok(())
            }
        }
    }

    fn on_payment_requested(
        &self,
        event: &crate::event::PaymentRequested,
    ) -> Result<(), DomainError> {
        let mut payment = self.load_payment(event.payment_id)?;

        if !payment.can_be_processed() {
            // A replayed request finding the payment failed may be the
            // only retry a lost PaymentFailed publish ever gets.
            if payment.status() == PaymentStatus::Failed {
                let recorded = payment.failure_reason().unwrap_or_default().to_string();
                self.ensure_published(event.payment_id, "PaymentFailed", || {
                    failed_event(&payment, &recorded, &event.header.metadata)
                })?;
            }
            tracing::debug!(
                payment_id = %event.payment_id,
                status = payment.status().as_str(),
                "payment already terminal, skipping redelivered request"
            );
            return Ok(());
        }

        // Redelivery after a partial run: the wallet was already
        // debited. Never debit twice; instead make sure both follow-up
        // events actually reached the bus. An appended row whose publish
        // failed is re-sent, not treated as done.
        let history = self.load_history(event.payment_id)?;
        if let Some(debited) = history.iter().find(|e| e.event_type == "WalletDebited") {
            if !debited.is_published() {
                republish(self.event_store.as_ref(), self.publisher.as_ref(), debited)?;
            }
            self.ensure_published(event.payment_id, "ExternalPaymentRequested", || {
                external_request_event(&payment, &event.header.metadata)
            })?;
            return Ok(());
        }

        let mut attempts = 0;
        loop {
            let Some(mut wallet) = self.wallet_repo.find_by_user_id(payment.user_id())? else {
                return self.fail_payment(&mut payment, WALLET_NOT_FOUND_REASON, &event.header.metadata);
            };

            let result = self.processor.process(&payment, &mut wallet)?;
            let (previous_balance, new_balance) = match result {
                ProcessResult::Rejected(reason) => {
                    return self.fail_payment(&mut payment, reason.as_str(), &event.header.metadata);
                }
                ProcessResult::Debited {
                    previous_balance,
                    new_balance,
                } => (previous_balance, new_balance),
            };

            match self.wallet_repo.update(&mut wallet) {
                Ok(()) => {
                    self.record(
                        &PaymentEvent::WalletDebited(WalletDebited {
                            header: EventHeader::new(event.header.metadata.clone()),
                            payment_id: payment.id(),
                            user_id: payment.user_id().clone(),
                            amount: payment.money().amount(),
                            prev_balance: previous_balance.amount(),
                            new_balance: new_balance.amount(),
                        }),
                    )?;
                    self.record(&external_request_event(&payment, &event.header.metadata))?;
                    tracing::info!(
                        payment_id = %payment.id(),
                        new_balance = %new_balance,
                        "wallet debited, gateway dispatch requested"
                    );
                    return Ok(());
                }
                Err(StoreError::VersionConflict { .. }) if attempts < self.max_wallet_retries => {
                    attempts += 1;
                    tracing::debug!(
                        payment_id = %payment.id(),
                        attempts,
                        "wallet write conflicted, reloading"
                    );
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn on_external_succeeded(
        &self,
        event: &crate::event::ExternalPaymentSucceeded,
    ) -> Result<(), DomainError> {
        let mut payment = self.load_payment(event.payment_id)?;

        if payment.status().is_terminal() {
            let same_tx = payment.external_tx_id() == Some(event.external_transaction_id.as_str());
            if same_tx {
                // Replay of a success we already applied; the completion
                // notification may be appended but never delivered, so
                // check the publish stamp, not mere log presence.
                self.ensure_published(event.payment_id, "PaymentCompleted", || {
                    completed_event(&payment, &event.header.metadata)
                })?;
            } else {
                tracing::warn!(
                    payment_id = %event.payment_id,
                    status = payment.status().as_str(),
                    "late gateway success for terminal payment, dropping"
                );
            }
            return Ok(());
        }

        payment.mark_completed(&event.external_transaction_id)?;
        self.payment_repo.update(&payment)?;
        self.record(&completed_event(&payment, &event.header.metadata))?;
        tracing::info!(payment_id = %payment.id(), "payment completed");
        Ok(())
    }

    fn on_refund_requested(
        &self,
        event: &crate::event::PaymentRefundRequested,
    ) -> Result<(), DomainError> {
        let payment = self.load_payment(event.payment_id)?;

        if payment.can_be_processed() {
            // The refund request outran the failure mark. Retryable:
            // redelivery will find the payment failed.
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                "refund requested for payment still pending",
            )
            .with_detail("paymentId", event.payment_id.to_string()));
        }
        if !payment.can_be_refunded() {
            tracing::warn!(
                payment_id = %event.payment_id,
                status = payment.status().as_str(),
                "refund requested for non-refundable payment, dropping"
            );
            return Ok(());
        }

        let history = self.load_history(event.payment_id)?;
        // Credited already? Then this is a redelivery after the credit
        // landed; the only work possibly left is a publish that failed.
        if let Some(credited) = history.iter().find(|e| e.event_type == "WalletCredited") {
            if !credited.is_published() {
                republish(self.event_store.as_ref(), self.publisher.as_ref(), credited)?;
            }
            return Ok(());
        }
        // A credit compensates a recorded debit; without one there is
        // nothing to give back.
        if !history.iter().any(|e| e.event_type == "WalletDebited") {
            tracing::warn!(
                payment_id = %event.payment_id,
                "refund requested but no debit on record, dropping"
            );
            return Ok(());
        }

        let mut attempts = 0;
        loop {
            let Some(mut wallet) = self.wallet_repo.find_by_user_id(payment.user_id())? else {
                return Err(DomainError::wallet_not_found(payment.user_id().as_str()));
            };

            let refund = self.processor.refund(&payment, &mut wallet)?;

            match self.wallet_repo.update(&mut wallet) {
                Ok(()) => {
                    self.record(&PaymentEvent::WalletCredited(WalletCredited {
                        header: EventHeader::new(event.header.metadata.clone()),
                        payment_id: payment.id(),
                        user_id: payment.user_id().clone(),
                        amount: payment.money().amount(),
                        prev_balance: refund.previous_balance.amount(),
                        new_balance: refund.new_balance.amount(),
                        reason: REFUND_CREDIT_REASON.to_string(),
                    }))?;
                    tracing::info!(
                        payment_id = %payment.id(),
                        new_balance = %refund.new_balance,
                        "wallet credited back"
                    );
                    return Ok(());
                }
                Err(StoreError::VersionConflict { .. }) if attempts < self.max_wallet_retries => {
                    attempts += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Mark the payment failed and emit `PaymentFailed`. A replay that
    /// finds the payment already failed only re-sends the notification
    /// if its first publish was lost.
    fn fail_payment(
        &self,
        payment: &mut Payment,
        reason: &str,
        metadata: &EventMetadata,
    ) -> Result<(), DomainError> {
        if payment.status().is_terminal() {
            if payment.status() == PaymentStatus::Failed {
                let recorded = payment.failure_reason().unwrap_or(reason).to_string();
                self.ensure_published(payment.id(), "PaymentFailed", || {
                    failed_event(payment, &recorded, metadata)
                })?;
            } else {
                tracing::debug!(
                    payment_id = %payment.id(),
                    status = payment.status().as_str(),
                    "payment already terminal, skipping failure mark"
                );
            }
            return Ok(());
        }

        payment.mark_failed(reason)?;
        self.payment_repo.update(payment)?;

        self.record(&failed_event(payment, reason, metadata))?;
        tracing::info!(payment_id = %payment.id(), reason, "payment failed");
        Ok(())
    }

    /// Mark the payment failed and request the compensating credit. The
    /// coordinator itself consumes the resulting `PaymentRefundRequested`
    /// to perform the credit.
    fn initiate_refund(
        &self,
        payment_id: PaymentId,
        reason: &str,
        metadata: &EventMetadata,
    ) -> Result<(), DomainError> {
        let mut payment = self.load_payment(payment_id)?;

        if payment.status().is_terminal() && !payment.can_be_refunded() {
            tracing::warn!(
                payment_id = %payment_id,
                status = payment.status().as_str(),
                "gateway failure for completed payment, dropping"
            );
            return Ok(());
        }

        if payment.can_be_processed() {
            payment.mark_failed(reason)?;
            self.payment_repo.update(&payment)?;
        }

        // On a replay, prefer the reason recorded on the aggregate so
        // the re-sent events match the first attempt.
        let reason = payment.failure_reason().unwrap_or(reason).to_string();

        self.ensure_published(payment_id, "PaymentFailed", || {
            failed_event(&payment, &reason, metadata)
        })?;
        self.ensure_published(payment_id, "PaymentRefundRequested", || {
            refund_requested_event(&payment, &reason, metadata)
        })?;
        tracing::info!(payment_id = %payment_id, reason = %reason, "refund initiated");
        Ok(())
    }

    /// Make sure an event of the given type for this payment has
    /// reached the bus. No row yet means append-and-publish a fresh
    /// one; an unpublished row means its publish failed and only the
    /// publish is re-attempted; a published row is done.
    fn ensure_published<F>(
        &self,
        payment_id: PaymentId,
        event_type: &str,
        make: F,
    ) -> Result<(), DomainError>
    where
        F: FnOnce() -> PaymentEvent,
    {
        let history = self.load_history(payment_id)?;
        match history.iter().find(|e| e.event_type == event_type) {
            None => self.record(&make()),
            Some(stored) if stored.is_published() => Ok(()),
            Some(stored) => republish(self.event_store.as_ref(), self.publisher.as_ref(), stored),
        }
    }

    fn record(&self, event: &PaymentEvent) -> Result<(), DomainError> {
        append_and_publish(self.event_store.as_ref(), self.publisher.as_ref(), event)
    }

    fn load_payment(&self, payment_id: PaymentId) -> Result<Payment, DomainError> {
        self.payment_repo
            .find_by_id(payment_id)?
            .ok_or_else(|| DomainError::payment_not_found(&payment_id.to_string()))
    }

    fn load_history(&self, payment_id: PaymentId) -> Result<Vec<StoredEvent>, DomainError> {
        self.event_store.list_by_payment(payment_id).map_err(|e| {
            DomainError::wrap(ErrorCode::EventStoreError, "failed to read event log", e)
        })
    }
}

fn external_request_event(payment: &Payment, metadata: &EventMetadata) -> PaymentEvent {
    PaymentEvent::ExternalPaymentRequested(ExternalPaymentRequestedEvent {
        header: EventHeader::new(metadata.clone()),
        payment_id: payment.id(),
        user_id: payment.user_id().clone(),
        money: *payment.money(),
        service_id: payment.service_id().clone(),
    })
}

fn completed_event(payment: &Payment, metadata: &EventMetadata) -> PaymentEvent {
    PaymentEvent::PaymentCompleted(PaymentCompleted {
        header: EventHeader::new(metadata.clone()),
        payment_id: payment.id(),
        user_id: payment.user_id().clone(),
        amount: payment.money().amount(),
        external_transaction_id: payment.external_tx_id().unwrap_or_default().to_string(),
    })
}

fn failed_event(payment: &Payment, reason: &str, metadata: &EventMetadata) -> PaymentEvent {
    PaymentEvent::PaymentFailed(PaymentFailed {
        header: EventHeader::new(metadata.clone()),
        payment_id: payment.id(),
        user_id: payment.user_id().clone(),
        amount: payment.money().amount(),
        reason: reason.to_string(),
    })
}

fn refund_requested_event(payment: &Payment, reason: &str, metadata: &EventMetadata) -> PaymentEvent {
    PaymentEvent::PaymentRefundRequested(PaymentRefundRequested {
        header: EventHeader::new(metadata.clone()),
        payment_id: payment.id(),
        user_id: payment.user_id().clone(),
        amount: payment.money().amount(),
        reason: reason.to_string(),
    })
}
