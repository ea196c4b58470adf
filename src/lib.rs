//! payflow: event-driven payment saga.
//!
//! Clients submit intent through the synchronous intake; everything
//! downstream happens over an at-least-once message bus. Each payment
//! walks a deterministic state machine (`PENDING` → `COMPLETED` |
//! `FAILED`), debiting the user's wallet, dispatching to the external
//! gateway, and crediting the wallet back when the forward path fails or
//! times out. Every step is recorded in an append-only per-payment event
//! log before it is published.

pub mod app;
pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod event;
pub mod http;
pub mod store;

pub use app::{
    CreatePaymentRequest, CreatePaymentResponse, CreatePaymentService, GatewayMode,
    GatewaySimulator, PaymentCoordinator,
};
pub use config::Config;
pub use domain::{
    Currency, IdempotencyKey, Money, Payment, PaymentId, PaymentStatus, Processor, ServiceId,
    UserId, Wallet,
};
pub use error::{DomainError, ErrorCode};
pub use event::{EventMetadata, PaymentEvent};
pub use store::{
    EventStore, IdempotencyStore, InMemoryEventStore, InMemoryIdempotencyStore,
    InMemoryPaymentRepository, InMemoryWalletRepository, PaymentRepository, StoredEvent,
    WalletRepository,
};
