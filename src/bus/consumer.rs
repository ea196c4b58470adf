//! Threaded queue consumer.
//!
//! Each queue is drained by one dedicated thread: receive with a bounded
//! wait, decode, hand the event to the handler, then ack on success or
//! nack on failure so the broker redelivers. Messages that cannot be
//! decoded are acked and dropped; they would never succeed, and the
//! codec boundary is where unknown event types are rejected.

use std::sync::mpsc::{channel, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::InMemoryQueue;
use crate::error::DomainError;
use crate::event::{codec, PaymentEvent};

/// Statistics from a consumer loop, returned by [`ConsumerThread::stop`].
#[derive(Debug, Default, Clone)]
pub struct ConsumerStats {
    pub received: usize,
    pub handled: usize,
    pub failed: usize,
    pub dropped: usize,
}

/// A background thread draining one queue.
///
/// Shutdown discipline: `stop()` signals the loop and joins. A message
/// in flight when the stop signal arrives finishes processing; anything
/// not acked simply becomes visible again after its timeout, which is
/// exactly the at-least-once contract.
pub struct ConsumerThread {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<ConsumerStats>>,
}

impl ConsumerThread {
    /// Spawn a consumer. The handler is invoked once per delivery; `Ok`
    /// acks the message, `Err` nacks it for redelivery.
    pub fn spawn<H>(queue: InMemoryQueue, handler: H) -> Self
    where
        H: Fn(&PaymentEvent) -> Result<(), DomainError> + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = ConsumerStats::default();
            let queue_name = queue.name().to_string();

            loop {
                match stop_rx.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                // Short waits so the stop signal is observed promptly;
                // the queue itself long-polls between them.
                let Some(delivery) = queue.receive(Duration::from_millis(50)) else {
                    continue;
                };
                stats.received += 1;

                let event = match codec::decode(&delivery.message.body) {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(
                            queue = %queue_name,
                            message_id = %delivery.message.id,
                            error = %err,
                            "dropping undecodable message"
                        );
                        queue.ack(delivery.receipt);
                        stats.dropped += 1;
                        continue;
                    }
                };

                match handler(&event) {
                    Ok(()) => {
                        queue.ack(delivery.receipt);
                        stats.handled += 1;
                    }
                    Err(err) => {
                        tracing::warn!(
                            queue = %queue_name,
                            event_type = event.event_type(),
                            payment_id = %event.payment_id(),
                            receive_count = delivery.receive_count,
                            error = %err,
                            "handler failed, returning message to queue"
                        );
                        queue.nack(delivery.receipt);
                        stats.failed += 1;
                    }
                }
            }

            stats
        });

        ConsumerThread {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the loop to stop and wait for it to finish.
    pub fn stop(mut self) -> ConsumerStats {
        let _ = self.stop_tx.send(());
        self.handle
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for ConsumerThread {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
