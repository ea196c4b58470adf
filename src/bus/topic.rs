use std::sync::{Arc, RwLock};

use uuid::Uuid;

use super::{InMemoryQueue, Message, PublishError, Publisher};

/// In-memory topic: publishing fans the message out to every subscribed
/// queue. Each queue gets its own copy with a fresh broker id, so acks on
/// one queue never affect another.
#[derive(Clone)]
pub struct InMemoryTopic {
    name: Arc<str>,
    queues: Arc<RwLock<Vec<InMemoryQueue>>>,
}

impl InMemoryTopic {
    pub fn new(name: impl Into<String>) -> Self {
        InMemoryTopic {
            name: Arc::from(name.into()),
            queues: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscribe(&self, queue: &InMemoryQueue) {
        if let Ok(mut queues) = self.queues.write() {
            queues.push(queue.clone());
        }
    }
}

impl Publisher for InMemoryTopic {
    fn publish(&self, message: Message) -> Result<(), PublishError> {
        let queues = self
            .queues
            .read()
            .map_err(|_| PublishError::Rejected("topic lock poisoned".to_string()))?;

        for queue in queues.iter() {
            queue.publish(Message::new(Uuid::new_v4().to_string(), message.body.clone()))?;
        }
        Ok(())
    }
}
