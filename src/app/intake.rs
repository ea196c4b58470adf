use std::sync::Arc;

use uuid::Uuid;

use super::{append_and_publish, republish};
use crate::bus::Publisher;
use crate::domain::{Currency, IdempotencyKey, Money, Payment, PaymentId, ServiceId, UserId};
use crate::error::{DomainError, ErrorCode};
use crate::event::{EventHeader, EventMetadata, PaymentEvent, PaymentRequested};
use crate::store::{EventStore, IdempotencyStore, PaymentRepository, WalletRepository};

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_ALREADY_PROCESSED: &str = "ALREADY_PROCESSED";

const EVENT_SOURCE: &str = "payflow-api";

/// A payment creation request as it arrives from the client.
#[derive(Clone, Debug)]
pub struct CreatePaymentRequest {
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub service_id: String,
    pub idempotency_key: String,
    pub client_id: String,
}

#[derive(Clone, Debug)]
pub struct CreatePaymentResponse {
    pub payment_id: PaymentId,
    pub status: &'static str,
}

/// Intake use case: validate, reserve the idempotency key, persist the
/// pending payment, and emit `PaymentRequested`.
///
/// The affordability check here is advisory only: the coordinator's
/// debit is authoritative and the two are deliberately not serialized.
/// Its job is to reject obviously doomed requests before creating state.
pub struct CreatePaymentService {
    payment_repo: Arc<dyn PaymentRepository>,
    wallet_repo: Arc<dyn WalletRepository>,
    idempotency: Arc<dyn IdempotencyStore>,
    event_store: Arc<dyn EventStore>,
    publisher: Arc<dyn Publisher>,
}

impl CreatePaymentService {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        wallet_repo: Arc<dyn WalletRepository>,
        idempotency: Arc<dyn IdempotencyStore>,
        event_store: Arc<dyn EventStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        CreatePaymentService {
            payment_repo,
            wallet_repo,
            idempotency,
            event_store,
            publisher,
        }
    }

    pub fn execute(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<CreatePaymentResponse, DomainError> {
        validate(&request)?;

        // Idempotency short-circuit: a repeated key returns the
        // established payment with no further side effects.
        let key = IdempotencyKey::new(request.idempotency_key.clone())?;
        if let Some(existing) = self.idempotency.get(&key)? {
            // A prior attempt may have appended `PaymentRequested` and
            // then failed to publish it; this retry is the only caller
            // that will ever come back for it, so finish the delivery.
            self.recover_unpublished(existing)?;
            tracing::info!(
                payment_id = %existing,
                idempotency_key = key.as_str(),
                "duplicate payment request short-circuited"
            );
            return Ok(CreatePaymentResponse {
                payment_id: existing,
                status: STATUS_ALREADY_PROCESSED,
            });
        }

        let user_id = UserId::new(request.user_id.clone())?;
        let currency = Currency::new(&request.currency)?;
        let money = Money::from_f64(request.amount, currency)?;
        let service_id = ServiceId::new(request.service_id.clone())?;

        self.check_affordability(&user_id, &money)?;

        let payment_id = PaymentId::generate();
        let payment = Payment::new(
            payment_id,
            user_id.clone(),
            service_id.clone(),
            money,
            key.clone(),
        )?;

        // Ordering matters: store the payment, then the key, then append
        // and publish. A failure before the key is written leaves no
        // binding, so the client can safely retry.
        self.payment_repo.save(&payment)?;

        if let Some(existing) = self.idempotency.put_if_absent(&key, payment_id)? {
            // Lost the first-writer race to a concurrent request with
            // the same key; the established payment wins.
            return Ok(CreatePaymentResponse {
                payment_id: existing,
                status: STATUS_ALREADY_PROCESSED,
            });
        }

        let metadata = EventMetadata::new(
            request.client_id.clone(),
            Uuid::new_v4().to_string(),
            EVENT_SOURCE,
        );
        let event = PaymentEvent::PaymentRequested(PaymentRequested {
            header: EventHeader::new(metadata),
            payment_id,
            user_id,
            money,
            service_id,
            idempotency_key: key,
        });
        append_and_publish(self.event_store.as_ref(), self.publisher.as_ref(), &event)?;

        tracing::info!(payment_id = %payment_id, amount = %money, "payment accepted");
        Ok(CreatePaymentResponse {
            payment_id,
            status: STATUS_PENDING,
        })
    }

    /// Re-send any appended events for this payment whose publish never
    /// succeeded.
    fn recover_unpublished(&self, payment_id: PaymentId) -> Result<(), DomainError> {
        let events = self.event_store.list_by_payment(payment_id).map_err(|e| {
            DomainError::wrap(ErrorCode::EventStoreError, "failed to read event log", e)
        })?;
        for stored in events.iter().filter(|e| !e.is_published()) {
            republish(self.event_store.as_ref(), self.publisher.as_ref(), stored)?;
        }
        Ok(())
    }

    /// Fast-feedback check only; does not debit.
    fn check_affordability(&self, user_id: &UserId, money: &Money) -> Result<(), DomainError> {
        let wallet = self
            .wallet_repo
            .find_by_user_id(user_id)?
            .ok_or_else(|| DomainError::wallet_not_found(user_id.as_str()))?;

        if !wallet.balance().same_currency(money) {
            return Err(DomainError::currency_mismatch(
                wallet.balance().currency().code(),
                money.currency().code(),
            ));
        }
        if !wallet.can_debit(money) {
            return Err(DomainError::insufficient_funds(
                money.to_string(),
                wallet.balance().to_string(),
            ));
        }
        Ok(())
    }
}

fn validate(request: &CreatePaymentRequest) -> Result<(), DomainError> {
    if request.user_id.is_empty() {
        return Err(DomainError::validation("userId", "is required"));
    }
    if request.amount <= 0.0 {
        return Err(DomainError::validation(
            "amount",
            "must be greater than zero",
        ));
    }
    if request.currency.is_empty() {
        return Err(DomainError::validation("currency", "is required"));
    }
    if request.service_id.is_empty() {
        return Err(DomainError::validation("serviceId", "is required"));
    }
    if request.idempotency_key.is_empty() {
        return Err(DomainError::validation("idempotencyKey", "is required"));
    }
    Ok(())
}
