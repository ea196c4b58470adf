//! Messaging adapter: one topic fans out to per-concern queues, each
//! drained by a dedicated consumer thread with at-least-once semantics
//! (visibility timeouts, redelivery, dead-letter routing).

mod consumer;
mod message;
mod publisher;
mod queue;
mod topic;

pub use consumer::{ConsumerStats, ConsumerThread};
pub use message::{Delivery, Message, Receipt};
pub use publisher::{PublishError, Publisher};
pub use queue::{InMemoryQueue, QueueOptions};
pub use topic::InMemoryTopic;
