use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::append_and_publish;
use crate::bus::Publisher;
use crate::domain::PaymentId;
use crate::error::DomainError;
use crate::event::{
    EventHeader, EventMetadata, ExternalPaymentFailed, ExternalPaymentSucceeded,
    ExternalPaymentTimeout, PaymentEvent,
};
use crate::store::EventStore;

const GATEWAY_SOURCE: &str = "external-gateway";
const REJECT_REASON: &str = "GATEWAY_REJECTED";
const REJECT_ERROR_CODE: &str = "ERR_GATEWAY_REJECTED";

/// How the simulated gateway answers every request. Deterministic so
/// scenarios can script the outcome they need.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GatewayMode {
    #[default]
    Succeed,
    Reject,
    Timeout,
}

impl GatewayMode {
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.to_ascii_lowercase().as_str() {
            "succeed" => Ok(GatewayMode::Succeed),
            "reject" => Ok(GatewayMode::Reject),
            "timeout" => Ok(GatewayMode::Timeout),
            other => Err(DomainError::validation(
                "gatewayMode",
                &format!("unknown mode: {}", other),
            )),
        }
    }
}

/// Stand-in for the external payment gateway: consumes
/// `ExternalPaymentRequested` from its queue and answers with a success,
/// a rejection, or a timeout event on the shared topic.
pub struct GatewaySimulator {
    event_store: Arc<dyn EventStore>,
    publisher: Arc<dyn Publisher>,
    mode: GatewayMode,
    timeout: Duration,
}

impl GatewaySimulator {
    pub fn new(
        event_store: Arc<dyn EventStore>,
        publisher: Arc<dyn Publisher>,
        mode: GatewayMode,
    ) -> Self {
        GatewaySimulator {
            event_store,
            publisher,
            mode,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Handler for the gateway queue.
    pub fn handle(&self, event: &PaymentEvent) -> Result<(), DomainError> {
        let request = match event {
            PaymentEvent::ExternalPaymentRequested(e) => e,
            other => {
                tracing::debug!(
                    event_type = other.event_type(),
                    "ignoring event on gateway queue"
                );
                return Ok(());
            }
        };

        let result = self.answer(request.payment_id, &request.header.metadata);
        tracing::info!(
            payment_id = %request.payment_id,
            outcome = result.event_type(),
            "gateway answered"
        );
        append_and_publish(self.event_store.as_ref(), self.publisher.as_ref(), &result)
    }

    fn answer(&self, payment_id: PaymentId, metadata: &EventMetadata) -> PaymentEvent {
        let mut metadata = metadata.clone();
        metadata.source = GATEWAY_SOURCE.to_string();

        match self.mode {
            GatewayMode::Succeed => PaymentEvent::ExternalPaymentSucceeded(
                ExternalPaymentSucceeded {
                    header: EventHeader::new(metadata),
                    payment_id,
                    external_transaction_id: Uuid::new_v4().to_string(),
                },
            ),
            GatewayMode::Reject => PaymentEvent::ExternalPaymentFailed(ExternalPaymentFailed {
                header: EventHeader::new(metadata),
                payment_id,
                reason: REJECT_REASON.to_string(),
                error_code: REJECT_ERROR_CODE.to_string(),
            }),
            GatewayMode::Timeout => PaymentEvent::ExternalPaymentTimeout(ExternalPaymentTimeout {
                header: EventHeader::new(metadata),
                payment_id,
                timeout: self.timeout,
            }),
        }
    }
}
