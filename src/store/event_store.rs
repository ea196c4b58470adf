use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoreError;
use crate::domain::PaymentId;
use crate::error::DomainError;
use crate::event::{codec, EventMetadata, PaymentEvent};

/// A persisted event, keyed `(payment_id, event_id)`.
///
/// `published_at` separates "appended to the log" from "delivered to the
/// bus": the append always happens first, and the publisher may still
/// fail afterwards. A row with `published_at: None` is a publish that
/// never went out and must be re-attempted on the next delivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub payment_id: PaymentId,
    pub event_type: String,
    #[serde(with = "payload_serde")]
    pub payload: Vec<u8>,
    pub metadata: EventMetadata,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl StoredEvent {
    /// Capture a domain event for the log; the payload is the event's
    /// wire encoding. The event is not yet published.
    pub fn record(event: &PaymentEvent) -> Result<Self, DomainError> {
        Ok(StoredEvent {
            event_id: Uuid::new_v4(),
            payment_id: event.payment_id(),
            event_type: event.event_type().to_string(),
            payload: codec::encode(event)?,
            metadata: event.metadata().clone(),
            occurred_at: event.occurred_at(),
            published_at: None,
        })
    }

    /// Decode the payload back into the domain event.
    pub fn event(&self) -> Result<PaymentEvent, DomainError> {
        codec::decode(&self.payload)
    }

    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }
}

mod payload_serde {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(payload: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(payload).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

/// Append-only per-payment event history.
///
/// `mark_published` stamps a row once its publish actually succeeded;
/// marking a row that does not exist is a no-op.
pub trait EventStore: Send + Sync {
    fn append(&self, event: StoredEvent) -> Result<(), StoreError>;
    fn list_by_payment(&self, payment_id: PaymentId) -> Result<Vec<StoredEvent>, StoreError>;
    fn mark_published(&self, payment_id: PaymentId, event_id: Uuid) -> Result<(), StoreError>;
}

#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<HashMap<PaymentId, Vec<StoredEvent>>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event type names appended for a payment, in append order. Test
    /// and operator convenience.
    pub fn event_types(&self, payment_id: PaymentId) -> Vec<String> {
        self.events
            .read()
            .map(|events| {
                events
                    .get(&payment_id)
                    .map(|list| list.iter().map(|e| e.event_type.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, event: StoredEvent) -> Result<(), StoreError> {
        let mut events = self
            .events
            .write()
            .map_err(|_| StoreError::LockPoisoned("event append"))?;
        let list = events.entry(event.payment_id).or_default();
        if list.iter().any(|stored| stored.event_id == event.event_id) {
            return Err(StoreError::DuplicateEvent {
                payment_id: event.payment_id.to_string(),
                event_id: event.event_id.to_string(),
            });
        }
        list.push(event);
        Ok(())
    }

    fn list_by_payment(&self, payment_id: PaymentId) -> Result<Vec<StoredEvent>, StoreError> {
        let events = self
            .events
            .read()
            .map_err(|_| StoreError::LockPoisoned("event read"))?;
        Ok(events.get(&payment_id).cloned().unwrap_or_default())
    }

    fn mark_published(&self, payment_id: PaymentId, event_id: Uuid) -> Result<(), StoreError> {
        let mut events = self
            .events
            .write()
            .map_err(|_| StoreError::LockPoisoned("event publish mark"))?;
        if let Some(list) = events.get_mut(&payment_id) {
            for stored in list.iter_mut() {
                if stored.event_id == event_id {
                    stored.published_at = Some(Utc::now());
                }
            }
        }
        Ok(())
    }
}
