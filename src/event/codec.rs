//! Bidirectional JSON codec for [`PaymentEvent`].
//!
//! Wire schema: every event is an object carrying `eventType`,
//! `occurredAt` (RFC3339 UTC) and `metadata`, plus type-specific fields.
//! Amounts cross the wire as JSON numbers; internally they are exact
//! decimals and the conversion happens only here. Unknown `eventType`
//! values are a decode error; consumers drop such messages before any
//! handler sees them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use super::{
    EventHeader, EventMetadata, ExternalPaymentFailed, ExternalPaymentRequested,
    ExternalPaymentSucceeded, ExternalPaymentTimeout, PaymentCompleted, PaymentEvent,
    PaymentFailed, PaymentRefundRequested, PaymentRequested, WalletCredited, WalletDebited,
};
use crate::domain::{Currency, IdempotencyKey, Money, PaymentId, ServiceId, UserId};
use crate::error::{DomainError, ErrorCode};

/// Serialize an event to its wire form.
pub fn encode(event: &PaymentEvent) -> Result<Vec<u8>, DomainError> {
    let mut object = match event {
        PaymentEvent::PaymentRequested(e) => json!({
            "paymentID": e.payment_id.to_string(),
            "userID": e.user_id.as_str(),
            "amount": dec_to_f64(e.money.amount()),
            "currency": e.money.currency().code(),
            "serviceID": e.service_id.as_str(),
            "idempotencyKey": e.idempotency_key.as_str(),
        }),
        PaymentEvent::WalletDebited(e) => json!({
            "paymentID": e.payment_id.to_string(),
            "userID": e.user_id.as_str(),
            "amount": dec_to_f64(e.amount),
            "prevBalance": dec_to_f64(e.prev_balance),
            "newBalance": dec_to_f64(e.new_balance),
        }),
        PaymentEvent::WalletCredited(e) => json!({
            "paymentID": e.payment_id.to_string(),
            "userID": e.user_id.as_str(),
            "amount": dec_to_f64(e.amount),
            "prevBalance": dec_to_f64(e.prev_balance),
            "newBalance": dec_to_f64(e.new_balance),
            "reason": e.reason,
        }),
        PaymentEvent::ExternalPaymentRequested(e) => json!({
            "paymentID": e.payment_id.to_string(),
            "userID": e.user_id.as_str(),
            "amount": dec_to_f64(e.money.amount()),
            "currency": e.money.currency().code(),
            "serviceID": e.service_id.as_str(),
        }),
        PaymentEvent::ExternalPaymentSucceeded(e) => json!({
            "paymentID": e.payment_id.to_string(),
            "externalTransactionID": e.external_transaction_id,
        }),
        PaymentEvent::ExternalPaymentFailed(e) => json!({
            "paymentID": e.payment_id.to_string(),
            "reason": e.reason,
            "errorCode": e.error_code,
        }),
        PaymentEvent::ExternalPaymentTimeout(e) => json!({
            "paymentID": e.payment_id.to_string(),
            "timeoutDuration": format_duration(e.timeout),
        }),
        PaymentEvent::PaymentCompleted(e) => json!({
            "paymentID": e.payment_id.to_string(),
            "userID": e.user_id.as_str(),
            "amount": dec_to_f64(e.amount),
            "externalTransactionID": e.external_transaction_id,
        }),
        PaymentEvent::PaymentFailed(e) => json!({
            "paymentID": e.payment_id.to_string(),
            "userID": e.user_id.as_str(),
            "amount": dec_to_f64(e.amount),
            "reason": e.reason,
        }),
        PaymentEvent::PaymentRefundRequested(e) => json!({
            "paymentID": e.payment_id.to_string(),
            "userID": e.user_id.as_str(),
            "amount": dec_to_f64(e.amount),
            "reason": e.reason,
        }),
    };

    let header = event.header();
    let map = object.as_object_mut().expect("event body is an object");
    map.insert("eventType".into(), json!(event.event_type()));
    map.insert(
        "occurredAt".into(),
        json!(header.occurred_at.to_rfc3339()),
    );
    map.insert(
        "metadata".into(),
        serde_json::to_value(&header.metadata).map_err(|e| {
            DomainError::wrap(ErrorCode::Internal, "failed to serialize metadata", e)
        })?,
    );

    serde_json::to_vec(&object)
        .map_err(|e| DomainError::wrap(ErrorCode::Internal, "failed to serialize event", e))
}

/// Deserialize an event from its wire form. Unknown `eventType` is an
/// error; so is any missing or mistyped field.
pub fn decode(bytes: &[u8]) -> Result<PaymentEvent, DomainError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| DomainError::wrap(ErrorCode::ValidationFailed, "event is not valid JSON", e))?;
    let object = value
        .as_object()
        .ok_or_else(|| DomainError::validation("event", "expected a JSON object"))?;

    let event_type = get_str(object, "eventType")?;
    let header = decode_header(object)?;

    let event = match event_type.as_str() {
        "PaymentRequested" => PaymentEvent::PaymentRequested(PaymentRequested {
            payment_id: get_payment_id(object)?,
            user_id: UserId::new(get_str(object, "userID")?)?,
            money: get_money(object)?,
            service_id: ServiceId::new(get_str(object, "serviceID")?)?,
            idempotency_key: IdempotencyKey::new(get_str(object, "idempotencyKey")?)?,
            header,
        }),
        "WalletDebited" => PaymentEvent::WalletDebited(WalletDebited {
            payment_id: get_payment_id(object)?,
            user_id: UserId::new(get_str(object, "userID")?)?,
            amount: get_decimal(object, "amount")?,
            prev_balance: get_decimal(object, "prevBalance")?,
            new_balance: get_decimal(object, "newBalance")?,
            header,
        }),
        "WalletCredited" => PaymentEvent::WalletCredited(WalletCredited {
            payment_id: get_payment_id(object)?,
            user_id: UserId::new(get_str(object, "userID")?)?,
            amount: get_decimal(object, "amount")?,
            prev_balance: get_decimal(object, "prevBalance")?,
            new_balance: get_decimal(object, "newBalance")?,
            reason: get_str(object, "reason")?,
            header,
        }),
        "ExternalPaymentRequested" => {
            PaymentEvent::ExternalPaymentRequested(ExternalPaymentRequested {
                payment_id: get_payment_id(object)?,
                user_id: UserId::new(get_str(object, "userID")?)?,
                money: get_money(object)?,
                service_id: ServiceId::new(get_str(object, "serviceID")?)?,
                header,
            })
        }
        "ExternalPaymentSucceeded" => {
            PaymentEvent::ExternalPaymentSucceeded(ExternalPaymentSucceeded {
                payment_id: get_payment_id(object)?,
                external_transaction_id: get_str(object, "externalTransactionID")?,
                header,
            })
        }
        "ExternalPaymentFailed" => PaymentEvent::ExternalPaymentFailed(ExternalPaymentFailed {
            payment_id: get_payment_id(object)?,
            reason: get_str(object, "reason")?,
            error_code: get_str(object, "errorCode")?,
            header,
        }),
        "ExternalPaymentTimeout" => PaymentEvent::ExternalPaymentTimeout(ExternalPaymentTimeout {
            payment_id: get_payment_id(object)?,
            timeout: parse_duration(&get_str(object, "timeoutDuration")?)?,
            header,
        }),
        "PaymentCompleted" => PaymentEvent::PaymentCompleted(PaymentCompleted {
            payment_id: get_payment_id(object)?,
            user_id: UserId::new(get_str(object, "userID")?)?,
            amount: get_decimal(object, "amount")?,
            external_transaction_id: get_str(object, "externalTransactionID")?,
            header,
        }),
        "PaymentFailed" => PaymentEvent::PaymentFailed(PaymentFailed {
            payment_id: get_payment_id(object)?,
            user_id: UserId::new(get_str(object, "userID")?)?,
            amount: get_decimal(object, "amount")?,
            reason: get_str(object, "reason")?,
            header,
        }),
        "PaymentRefundRequested" => {
            PaymentEvent::PaymentRefundRequested(PaymentRefundRequested {
                payment_id: get_payment_id(object)?,
                user_id: UserId::new(get_str(object, "userID")?)?,
                amount: get_decimal(object, "amount")?,
                reason: get_str(object, "reason")?,
                header,
            })
        }
        unknown => {
            return Err(DomainError::validation(
                "eventType",
                &format!("unknown event type: {}", unknown),
            ))
        }
    };

    Ok(event)
}

/// Canonical duration string: whole seconds as `"30s"`, anything with a
/// sub-second component as milliseconds, e.g. `"1500ms"`.
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 && duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

pub fn parse_duration(s: &str) -> Result<Duration, DomainError> {
    let parse = |digits: &str| -> Result<u64, DomainError> {
        digits
            .parse::<u64>()
            .map_err(|e| DomainError::wrap(ErrorCode::ValidationFailed, "invalid duration", e))
    };

    if let Some(millis) = s.strip_suffix("ms") {
        return Ok(Duration::from_millis(parse(millis)?));
    }
    if let Some(secs) = s.strip_suffix('s') {
        return Ok(Duration::from_secs(parse(secs)?));
    }
    Err(DomainError::validation(
        "timeoutDuration",
        &format!("unrecognized duration format: {}", s),
    ))
}

fn decode_header(object: &Map<String, Value>) -> Result<EventHeader, DomainError> {
    let occurred_at = get_str(object, "occurredAt")?;
    let occurred_at = DateTime::parse_from_rfc3339(&occurred_at)
        .map_err(|e| {
            DomainError::wrap(ErrorCode::ValidationFailed, "occurredAt is not RFC3339", e)
        })?
        .with_timezone(&Utc);

    let metadata = match object.get("metadata") {
        Some(value) => serde_json::from_value::<EventMetadata>(value.clone()).map_err(|e| {
            DomainError::wrap(ErrorCode::ValidationFailed, "invalid event metadata", e)
        })?,
        None => EventMetadata::default(),
    };

    Ok(EventHeader::at(occurred_at, metadata))
}

fn get_str(object: &Map<String, Value>, field: &str) -> Result<String, DomainError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DomainError::validation(field, "missing or not a string"))
}

fn get_f64(object: &Map<String, Value>, field: &str) -> Result<f64, DomainError> {
    object
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| DomainError::validation(field, "missing or not a number"))
}

fn get_decimal(object: &Map<String, Value>, field: &str) -> Result<Decimal, DomainError> {
    let raw = get_f64(object, field)?;
    Decimal::try_from(raw).map_err(|e| {
        DomainError::wrap(ErrorCode::InvalidAmount, "amount is not representable", e)
            .with_detail(field, raw.to_string())
    })
}

fn get_payment_id(object: &Map<String, Value>) -> Result<PaymentId, DomainError> {
    PaymentId::parse(&get_str(object, "paymentID")?)
}

fn get_money(object: &Map<String, Value>) -> Result<Money, DomainError> {
    let currency = Currency::new(&get_str(object, "currency")?)?;
    Money::from_f64(get_f64(object, "amount")?, currency)
}

fn dec_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requested() -> PaymentEvent {
        PaymentEvent::PaymentRequested(PaymentRequested {
            header: EventHeader::new(EventMetadata::new("web", "req-1", "payflow-api")),
            payment_id: PaymentId::generate(),
            user_id: UserId::new("user-123").unwrap(),
            money: Money::from_str("100.50", Currency::ARS).unwrap(),
            service_id: ServiceId::new("svc-1").unwrap(),
            idempotency_key: IdempotencyKey::new("key-A").unwrap(),
        })
    }

    #[test]
    fn encode_carries_common_fields() {
        let bytes = encode(&requested()).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["eventType"], "PaymentRequested");
        assert_eq!(value["currency"], "ARS");
        assert_eq!(value["amount"], 100.5);
        assert_eq!(value["metadata"]["clientId"], "web");
        assert!(value["occurredAt"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn round_trip_payment_requested() {
        let event = requested();
        let back = decode(&encode(&event).unwrap()).unwrap();
        match (&event, &back) {
            (PaymentEvent::PaymentRequested(a), PaymentEvent::PaymentRequested(b)) => {
                assert_eq!(a.payment_id, b.payment_id);
                assert_eq!(a.user_id, b.user_id);
                assert_eq!(a.money, b.money);
                assert_eq!(a.idempotency_key, b.idempotency_key);
                assert_eq!(a.header.metadata, b.header.metadata);
            }
            _ => panic!("variant changed in transit"),
        }
    }

    #[test]
    fn round_trip_timeout_duration() {
        let event = PaymentEvent::ExternalPaymentTimeout(ExternalPaymentTimeout {
            header: EventHeader::new(EventMetadata::default()),
            payment_id: PaymentId::generate(),
            timeout: Duration::from_secs(30),
        });
        let bytes = encode(&event).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["timeoutDuration"], "30s");

        match decode(&bytes).unwrap() {
            PaymentEvent::ExternalPaymentTimeout(e) => {
                assert_eq!(e.timeout, Duration::from_secs(30));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let raw = json!({
            "eventType": "PaymentTeleported",
            "occurredAt": Utc::now().to_rfc3339(),
            "metadata": {},
            "paymentID": PaymentId::generate().to_string(),
        });
        let err = decode(raw.to_string().as_bytes()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationFailed);
        assert!(err.message().contains("unknown event type"));
    }

    #[test]
    fn missing_field_is_rejected() {
        let raw = json!({
            "eventType": "ExternalPaymentSucceeded",
            "occurredAt": Utc::now().to_rfc3339(),
            "metadata": {},
            "paymentID": PaymentId::generate().to_string(),
            // externalTransactionID missing
        });
        assert!(decode(raw.to_string().as_bytes()).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode(b"not json").is_err());
        assert!(decode(b"[1,2,3]").is_err());
    }

    #[test]
    fn duration_strings() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(
            parse_duration("1500ms").unwrap(),
            Duration::from_millis(1500)
        );
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("m30s").is_err());
    }

    #[test]
    fn wallet_events_round_trip() {
        let event = PaymentEvent::WalletCredited(WalletCredited {
            header: EventHeader::new(EventMetadata::default()),
            payment_id: PaymentId::generate(),
            user_id: UserId::new("user-123").unwrap(),
            amount: Decimal::new(10050, 2),
            prev_balance: Decimal::new(29950, 2),
            new_balance: Decimal::new(40000, 2),
            reason: "REFUND".to_string(),
        });
        match decode(&encode(&event).unwrap()).unwrap() {
            PaymentEvent::WalletCredited(e) => {
                assert_eq!(e.amount, Decimal::new(10050, 2));
                assert_eq!(e.new_balance, Decimal::new(40000, 2));
                assert_eq!(e.reason, "REFUND");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
