//! In-memory queue with at-least-once delivery semantics.
//!
//! Models the behavior the coordinator depends on: a received message
//! becomes invisible for a bounded period; it is deleted only on ack; a
//! nacked (or never-acked) message reappears; and a message received
//! more than `max_receive_count` times is routed to the queue's
//! dead-letter store instead of delivered.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{Delivery, Message, PublishError, Publisher, Receipt};

/// Redrive and visibility settings, mirroring the broker queue
/// attributes the service is deployed against.
#[derive(Clone, Debug)]
pub struct QueueOptions {
    pub visibility_timeout: Duration,
    pub max_receive_count: u32,
    /// Carried for interface parity; the in-memory queue never expires
    /// messages.
    pub retention: Duration,
    pub dlq_retention: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        QueueOptions {
            visibility_timeout: Duration::from_secs(30),
            max_receive_count: 3,
            retention: Duration::from_secs(86_400),
            dlq_retention: Duration::from_secs(1_209_600),
        }
    }
}

struct Entry {
    message: Message,
    receive_count: u32,
    visible_at: Instant,
    receipt: Option<u64>,
}

struct QueueState {
    entries: VecDeque<Entry>,
    dead_letters: Vec<Message>,
    next_receipt: u64,
}

/// A named queue. Cloning returns another handle to the same queue.
#[derive(Clone)]
pub struct InMemoryQueue {
    name: Arc<str>,
    options: QueueOptions,
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, QueueOptions::default())
    }

    pub fn with_options(name: impl Into<String>, options: QueueOptions) -> Self {
        InMemoryQueue {
            name: Arc::from(name.into()),
            options,
            state: Arc::new(Mutex::new(QueueState {
                entries: VecDeque::new(),
                dead_letters: Vec::new(),
                next_receipt: 1,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    /// Receive the next visible message, long-polling up to `wait`.
    /// Returns `None` when the wait expires with nothing deliverable.
    pub fn receive(&self, wait: Duration) -> Option<Delivery> {
        let deadline = Instant::now() + wait;

        loop {
            if let Some(delivery) = self.try_receive() {
                return Some(delivery);
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn try_receive(&self) -> Option<Delivery> {
        let mut state = self.state.lock().ok()?;
        let now = Instant::now();

        let mut index = 0;
        while index < state.entries.len() {
            if state.entries[index].visible_at > now {
                index += 1;
                continue;
            }

            // Visible entry. Route to the DLQ when its redelivery
            // budget is spent, otherwise deliver it.
            if state.entries[index].receive_count >= self.options.max_receive_count {
                let entry = state.entries.remove(index).expect("index in bounds");
                state.dead_letters.push(entry.message);
                continue;
            }

            let receipt = state.next_receipt;
            state.next_receipt += 1;

            let entry = &mut state.entries[index];
            entry.receive_count += 1;
            entry.visible_at = now + self.options.visibility_timeout;
            entry.receipt = Some(receipt);

            return Some(Delivery {
                message: entry.message.clone(),
                receipt: Receipt(receipt),
                receive_count: entry.receive_count,
            });
        }

        None
    }

    /// Delete a message after successful processing. Acking with an
    /// expired receipt is a no-op: the message has already been handed
    /// to someone else.
    pub fn ack(&self, receipt: Receipt) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.retain(|entry| entry.receipt != Some(receipt.0));
        }
    }

    /// Return a message to the queue immediately instead of waiting out
    /// its visibility timeout.
    pub fn nack(&self, receipt: Receipt) {
        if let Ok(mut state) = self.state.lock() {
            let now = Instant::now();
            for entry in state.entries.iter_mut() {
                if entry.receipt == Some(receipt.0) {
                    entry.visible_at = now;
                    entry.receipt = None;
                }
            }
        }
    }

    /// Messages that exhausted their redelivery budget.
    pub fn dead_letters(&self) -> Vec<Message> {
        self.state
            .lock()
            .map(|state| state.dead_letters.clone())
            .unwrap_or_default()
    }

    /// Number of messages still queued (visible or in flight).
    pub fn pending(&self) -> usize {
        self.state.lock().map(|state| state.entries.len()).unwrap_or(0)
    }
}

impl Publisher for InMemoryQueue {
    fn publish(&self, message: Message) -> Result<(), PublishError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| PublishError::Rejected("queue lock poisoned".to_string()))?;
        state.entries.push_back(Entry {
            message,
            receive_count: 0,
            visible_at: Instant::now(),
            receipt: None,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_queue(max_receive_count: u32) -> InMemoryQueue {
        InMemoryQueue::with_options(
            "test-queue",
            QueueOptions {
                visibility_timeout: Duration::from_millis(20),
                max_receive_count,
                ..QueueOptions::default()
            },
        )
    }

    fn msg(id: &str) -> Message {
        Message::new(id, format!("body-{}", id).into_bytes())
    }

    #[test]
    fn publish_receive_ack() {
        let queue = fast_queue(3);
        queue.publish(msg("m1")).unwrap();

        let delivery = queue.receive(Duration::from_millis(50)).unwrap();
        assert_eq!(delivery.message.id, "m1");
        assert_eq!(delivery.receive_count, 1);

        queue.ack(delivery.receipt);
        assert_eq!(queue.pending(), 0);
        assert!(queue.receive(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn received_message_is_invisible_until_timeout() {
        let queue = fast_queue(3);
        queue.publish(msg("m1")).unwrap();

        let first = queue.receive(Duration::from_millis(50)).unwrap();
        // Still in flight, nothing to receive right now.
        assert!(queue.receive(Duration::from_millis(5)).is_none());

        // After the visibility timeout it comes back with a higher count.
        let second = queue.receive(Duration::from_millis(100)).unwrap();
        assert_eq!(second.message.id, "m1");
        assert_eq!(second.receive_count, 2);
        assert_ne!(first.receipt, second.receipt);
    }

    #[test]
    fn nack_makes_message_immediately_visible() {
        let queue = fast_queue(3);
        queue.publish(msg("m1")).unwrap();

        let delivery = queue.receive(Duration::from_millis(50)).unwrap();
        queue.nack(delivery.receipt);

        let redelivered = queue.receive(Duration::from_millis(5)).unwrap();
        assert_eq!(redelivered.receive_count, 2);
    }

    #[test]
    fn exhausted_message_routes_to_dlq() {
        let queue = fast_queue(2);
        queue.publish(msg("poison")).unwrap();

        for _ in 0..2 {
            let delivery = queue.receive(Duration::from_millis(50)).unwrap();
            queue.nack(delivery.receipt);
        }

        // Third receive attempt moves it to the DLQ instead.
        assert!(queue.receive(Duration::from_millis(10)).is_none());
        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, "poison");
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn ack_with_stale_receipt_is_noop() {
        let queue = fast_queue(3);
        queue.publish(msg("m1")).unwrap();

        let first = queue.receive(Duration::from_millis(50)).unwrap();
        // Visibility expires and another consumer picks it up.
        let second = queue.receive(Duration::from_millis(100)).unwrap();

        queue.ack(first.receipt);
        assert_eq!(queue.pending(), 1, "stale ack must not delete");

        queue.ack(second.receipt);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn fifo_between_visible_messages() {
        let queue = fast_queue(3);
        queue.publish(msg("a")).unwrap();
        queue.publish(msg("b")).unwrap();

        let first = queue.receive(Duration::from_millis(50)).unwrap();
        let second = queue.receive(Duration::from_millis(50)).unwrap();
        assert_eq!(first.message.id, "a");
        assert_eq!(second.message.id, "b");
    }

    #[test]
    fn clones_share_state() {
        let queue = fast_queue(3);
        let handle = queue.clone();
        queue.publish(msg("m1")).unwrap();
        assert!(handle.receive(Duration::from_millis(50)).is_some());
    }
}
