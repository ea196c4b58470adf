use std::error::Error;
use std::fmt;

use super::Message;
use crate::error::{DomainError, ErrorCode};

/// Publish a message to a topic or queue.
pub trait Publisher: Send + Sync {
    fn publish(&self, message: Message) -> Result<(), PublishError>;
}

/// Error type for publish operations.
#[derive(Debug)]
pub enum PublishError {
    /// Connection to the broker failed
    ConnectionFailed(String),
    /// The broker rejected the message
    Rejected(String),
    /// Other error
    Other(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::ConnectionFailed(msg) => write!(f, "connection failed: {}", msg),
            PublishError::Rejected(msg) => write!(f, "message rejected: {}", msg),
            PublishError::Other(e) => write!(f, "publish error: {}", e),
        }
    }
}

impl Error for PublishError {}

impl From<PublishError> for DomainError {
    fn from(err: PublishError) -> Self {
        DomainError::wrap(ErrorCode::EventPublishError, "failed to publish event", err)
    }
}
