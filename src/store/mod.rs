//! Persistence traits and the in-memory implementations the binary and
//! tests run on. Payments are keyed by payment id, wallets by user id,
//! idempotency records by key, and the event log by `(payment_id,
//! event_id)`.

mod error;
mod event_store;
mod idempotency;
mod payment_repository;
mod wallet_repository;

pub use error::StoreError;
pub use event_store::{EventStore, InMemoryEventStore, StoredEvent};
pub use idempotency::{IdempotencyStore, InMemoryIdempotencyStore};
pub use payment_repository::{InMemoryPaymentRepository, PaymentRepository};
pub use wallet_repository::{InMemoryWalletRepository, WalletRepository};
