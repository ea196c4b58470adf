//! Event model and wire codec.
//!
//! Events are a closed sum type ([`PaymentEvent`]); every variant
//! composes the common [`EventHeader`] instead of inheriting from a base
//! type. The codec is the only place the wire's JSON-number amounts meet
//! the internal exact decimals.

pub mod codec;
mod events;
mod metadata;

pub use events::{
    EventHeader, ExternalPaymentFailed, ExternalPaymentRequested, ExternalPaymentSucceeded,
    ExternalPaymentTimeout, PaymentCompleted, PaymentEvent, PaymentFailed, PaymentRefundRequested,
    PaymentRequested, WalletCredited, WalletDebited,
};
pub use metadata::EventMetadata;
