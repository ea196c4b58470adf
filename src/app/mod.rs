//! Application services: the intake use case, the saga coordinator, and
//! the external-gateway simulator. Collaborators (repositories, stores,
//! publisher) are injected at construction; there is no process-wide
//! state.

mod coordinator;
mod gateway;
mod intake;

pub use coordinator::PaymentCoordinator;
pub use gateway::{GatewayMode, GatewaySimulator};
pub use intake::{CreatePaymentRequest, CreatePaymentResponse, CreatePaymentService};

use uuid::Uuid;

use crate::bus::{Message, Publisher};
use crate::error::{DomainError, ErrorCode};
use crate::event::PaymentEvent;
use crate::store::{EventStore, StoredEvent};

/// Append an event to the log, then publish it. The append always comes
/// first: if it succeeds and the publish fails, the caller's message is
/// redelivered and duplicates are tolerated downstream. The row is
/// stamped as published only after the publish succeeded, so a
/// redelivered handler can tell an event that reached the bus from one
/// that only reached the log.
pub(crate) fn append_and_publish(
    event_store: &dyn EventStore,
    publisher: &dyn Publisher,
    event: &PaymentEvent,
) -> Result<(), DomainError> {
    let stored = StoredEvent::record(event)?;
    let payment_id = stored.payment_id;
    let event_id = stored.event_id;
    let body = stored.payload.clone();

    event_store
        .append(stored)
        .map_err(|e| DomainError::wrap(ErrorCode::EventStoreError, "failed to store event", e))?;

    publisher.publish(Message::new(Uuid::new_v4().to_string(), body))?;

    event_store.mark_published(payment_id, event_id).map_err(|e| {
        DomainError::wrap(ErrorCode::EventStoreError, "failed to mark event published", e)
    })?;
    Ok(())
}

/// Re-send an appended event whose original publish was lost, then
/// stamp it. Duplicates on the bus are tolerated; a dropped event is
/// not.
pub(crate) fn republish(
    event_store: &dyn EventStore,
    publisher: &dyn Publisher,
    stored: &StoredEvent,
) -> Result<(), DomainError> {
    publisher.publish(Message::new(
        Uuid::new_v4().to_string(),
        stored.payload.clone(),
    ))?;
    event_store
        .mark_published(stored.payment_id, stored.event_id)
        .map_err(|e| {
            DomainError::wrap(ErrorCode::EventStoreError, "failed to mark event published", e)
        })?;
    tracing::info!(
        payment_id = %stored.payment_id,
        event_type = %stored.event_type,
        "republished event whose first publish was lost"
    );
    Ok(())
}
