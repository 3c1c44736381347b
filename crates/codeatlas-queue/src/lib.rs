//! At-least-once delivery queue for scan and summarize messages.
//!
//! Receiving moves a message in flight with a visibility deadline; only an
//! ack removes it. A consumer that dies or errors simply never acks, and the
//! message returns to the tail once the deadline passes. Deliveries beyond
//! the configured receive bound land in the dead-letter buffer for manual
//! inspection instead of looping forever.

use codeatlas_core::QueueConfig;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Unknown receipt: {0}")]
    UnknownReceipt(u64),
}

pub type ReceiptHandle = u64;

/// One received message. Dropping it without [`DeliveryQueue::ack`] leaves
/// the message in flight until the visibility timeout redelivers it.
#[derive(Debug, Clone)]
pub struct Delivery<M> {
    pub message: M,
    pub receipt: ReceiptHandle,
    pub receive_count: u32,
}

#[derive(Debug, Clone)]
struct Envelope<M> {
    message: M,
    receive_count: u32,
}

#[derive(Debug)]
struct InFlight<M> {
    envelope: Envelope<M>,
    visible_at: Instant,
}

#[derive(Debug)]
struct QueueInner<M> {
    next_receipt: u64,
    pending: VecDeque<Envelope<M>>,
    in_flight: HashMap<ReceiptHandle, InFlight<M>>,
    dead_letters: Vec<M>,
}

pub struct DeliveryQueue<M> {
    config: QueueConfig,
    inner: Mutex<QueueInner<M>>,
}

impl<M: Clone + Send> DeliveryQueue<M> {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(QueueInner {
                next_receipt: 1,
                pending: VecDeque::new(),
                in_flight: HashMap::new(),
                dead_letters: Vec::new(),
            }),
        }
    }

    pub fn send(&self, message: M) {
        let mut inner = self.inner.lock();
        inner.pending.push_back(Envelope {
            message,
            receive_count: 0,
        });
    }

    /// Next visible message, if any. Expired in-flight messages are returned
    /// to the tail first, so an abandoned delivery resurfaces here.
    pub fn receive(&self) -> Option<Delivery<M>> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        Self::requeue_expired(&mut inner, now);

        while let Some(mut envelope) = inner.pending.pop_front() {
            envelope.receive_count += 1;
            if envelope.receive_count > self.config.max_receive_count {
                warn!(
                    receive_count = envelope.receive_count,
                    "message exceeded receive bound, dead-lettering"
                );
                inner.dead_letters.push(envelope.message);
                continue;
            }

            let receipt = inner.next_receipt;
            inner.next_receipt += 1;
            let delivery = Delivery {
                message: envelope.message.clone(),
                receipt,
                receive_count: envelope.receive_count,
            };
            inner.in_flight.insert(
                receipt,
                InFlight {
                    envelope,
                    visible_at: now + Duration::from_secs(self.config.visibility_timeout_secs),
                },
            );
            return Some(delivery);
        }
        None
    }

    pub fn ack(&self, receipt: ReceiptHandle) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        inner
            .in_flight
            .remove(&receipt)
            .map(|_| debug!(receipt, "message acked"))
            .ok_or(QueueError::UnknownReceipt(receipt))
    }

    /// Park a message straight in the dead-letter buffer.
    pub fn send_to_dead_letter(&self, message: M) {
        self.inner.lock().dead_letters.push(message);
    }

    pub fn pending_len(&self) -> usize {
        let mut inner = self.inner.lock();
        Self::requeue_expired(&mut inner, Instant::now());
        inner.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    pub fn dead_letters(&self) -> Vec<M> {
        self.inner.lock().dead_letters.clone()
    }

    pub fn is_idle(&self) -> bool {
        let mut inner = self.inner.lock();
        Self::requeue_expired(&mut inner, Instant::now());
        inner.pending.is_empty() && inner.in_flight.is_empty()
    }

    fn requeue_expired(inner: &mut QueueInner<M>, now: Instant) {
        let expired: Vec<ReceiptHandle> = inner
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(r, _)| *r)
            .collect();
        for receipt in expired {
            if let Some(flight) = inner.in_flight.remove(&receipt) {
                debug!(receipt, "visibility timeout expired, requeueing");
                inner.pending.push_back(flight.envelope);
            }
        }
    }
}
