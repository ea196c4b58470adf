//! Domain model: value objects, the payment and wallet aggregates, and
//! the processor domain service that coordinates one step between them.

mod currency;
mod ids;
mod money;
mod payment;
mod processor;
mod status;
mod wallet;

pub use currency::Currency;
pub use ids::{IdempotencyKey, PaymentId, ServiceId, UserId};
pub use money::Money;
pub use payment::Payment;
pub use processor::{FailureReason, ProcessResult, Processor, RefundResult};
pub use status::PaymentStatus;
pub use wallet::Wallet;
