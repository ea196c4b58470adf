use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::EventMetadata;
use crate::domain::{IdempotencyKey, Money, PaymentId, ServiceId, UserId};

/// Fields shared by every event. Variants compose this record instead of
/// inheriting from a base type.
#[derive(Clone, Debug, PartialEq)]
pub struct EventHeader {
    pub occurred_at: DateTime<Utc>,
    pub metadata: EventMetadata,
}

impl EventHeader {
    pub fn new(metadata: EventMetadata) -> Self {
        EventHeader {
            occurred_at: Utc::now(),
            metadata,
        }
    }

    pub fn at(occurred_at: DateTime<Utc>, metadata: EventMetadata) -> Self {
        EventHeader {
            occurred_at,
            metadata,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaymentRequested {
    pub header: EventHeader,
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub money: Money,
    pub service_id: ServiceId,
    pub idempotency_key: IdempotencyKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WalletDebited {
    pub header: EventHeader,
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub prev_balance: Decimal,
    pub new_balance: Decimal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WalletCredited {
    pub header: EventHeader,
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub prev_balance: Decimal,
    pub new_balance: Decimal,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExternalPaymentRequested {
    pub header: EventHeader,
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub money: Money,
    pub service_id: ServiceId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExternalPaymentSucceeded {
    pub header: EventHeader,
    pub payment_id: PaymentId,
    pub external_transaction_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExternalPaymentFailed {
    pub header: EventHeader,
    pub payment_id: PaymentId,
    pub reason: String,
    pub error_code: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExternalPaymentTimeout {
    pub header: EventHeader,
    pub payment_id: PaymentId,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaymentCompleted {
    pub header: EventHeader,
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub external_transaction_id: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaymentFailed {
    pub header: EventHeader,
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PaymentRefundRequested {
    pub header: EventHeader,
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub amount: Decimal,
    pub reason: String,
}

/// Every event the system produces or consumes, as a closed tagged
/// variant. Handler dispatch is a match on this tag; unknown tags are
/// rejected at the codec boundary, never inside a handler.
#[derive(Clone, Debug, PartialEq)]
pub enum PaymentEvent {
    PaymentRequested(PaymentRequested),
    WalletDebited(WalletDebited),
    WalletCredited(WalletCredited),
    ExternalPaymentRequested(ExternalPaymentRequested),
    ExternalPaymentSucceeded(ExternalPaymentSucceeded),
    ExternalPaymentFailed(ExternalPaymentFailed),
    ExternalPaymentTimeout(ExternalPaymentTimeout),
    PaymentCompleted(PaymentCompleted),
    PaymentFailed(PaymentFailed),
    PaymentRefundRequested(PaymentRefundRequested),
}

impl PaymentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentRequested(_) => "PaymentRequested",
            PaymentEvent::WalletDebited(_) => "WalletDebited",
            PaymentEvent::WalletCredited(_) => "WalletCredited",
            PaymentEvent::ExternalPaymentRequested(_) => "ExternalPaymentRequested",
            PaymentEvent::ExternalPaymentSucceeded(_) => "ExternalPaymentSucceeded",
            PaymentEvent::ExternalPaymentFailed(_) => "ExternalPaymentFailed",
            PaymentEvent::ExternalPaymentTimeout(_) => "ExternalPaymentTimeout",
            PaymentEvent::PaymentCompleted(_) => "PaymentCompleted",
            PaymentEvent::PaymentFailed(_) => "PaymentFailed",
            PaymentEvent::PaymentRefundRequested(_) => "PaymentRefundRequested",
        }
    }

    pub fn payment_id(&self) -> PaymentId {
        match self {
            PaymentEvent::PaymentRequested(e) => e.payment_id,
            PaymentEvent::WalletDebited(e) => e.payment_id,
            PaymentEvent::WalletCredited(e) => e.payment_id,
            PaymentEvent::ExternalPaymentRequested(e) => e.payment_id,
            PaymentEvent::ExternalPaymentSucceeded(e) => e.payment_id,
            PaymentEvent::ExternalPaymentFailed(e) => e.payment_id,
            PaymentEvent::ExternalPaymentTimeout(e) => e.payment_id,
            PaymentEvent::PaymentCompleted(e) => e.payment_id,
            PaymentEvent::PaymentFailed(e) => e.payment_id,
            PaymentEvent::PaymentRefundRequested(e) => e.payment_id,
        }
    }

    pub fn header(&self) -> &EventHeader {
        match self {
            PaymentEvent::PaymentRequested(e) => &e.header,
            PaymentEvent::WalletDebited(e) => &e.header,
            PaymentEvent::WalletCredited(e) => &e.header,
            PaymentEvent::ExternalPaymentRequested(e) => &e.header,
            PaymentEvent::ExternalPaymentSucceeded(e) => &e.header,
            PaymentEvent::ExternalPaymentFailed(e) => &e.header,
            PaymentEvent::ExternalPaymentTimeout(e) => &e.header,
            PaymentEvent::PaymentCompleted(e) => &e.header,
            PaymentEvent::PaymentFailed(e) => &e.header,
            PaymentEvent::PaymentRefundRequested(e) => &e.header,
        }
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.header().metadata
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.header().occurred_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;

    #[test]
    fn event_type_and_payment_id_accessors() {
        let payment_id = PaymentId::generate();
        let event = PaymentEvent::PaymentRequested(PaymentRequested {
            header: EventHeader::new(EventMetadata::default()),
            payment_id,
            user_id: UserId::new("user-123").unwrap(),
            money: Money::from_str("100.50", Currency::ARS).unwrap(),
            service_id: ServiceId::new("svc-1").unwrap(),
            idempotency_key: IdempotencyKey::new("key-A").unwrap(),
        });

        assert_eq!(event.event_type(), "PaymentRequested");
        assert_eq!(event.payment_id(), payment_id);
    }

    #[test]
    fn metadata_flows_through_header() {
        let event = PaymentEvent::ExternalPaymentTimeout(ExternalPaymentTimeout {
            header: EventHeader::new(EventMetadata::new("web", "req-1", "gateway")),
            payment_id: PaymentId::generate(),
            timeout: Duration::from_secs(30),
        });
        assert_eq!(event.metadata().client_id, "web");
        assert_eq!(event.metadata().source, "gateway");
    }
}
