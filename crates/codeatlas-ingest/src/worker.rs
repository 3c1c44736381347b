use crate::coordinator::LifecycleCoordinator;
use crate::summarizer::Summarizer;
use codeatlas_core::{ScanMessage, SummarizeMessage};
use codeatlas_queue::DeliveryQueue;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Pulls scan and summarize messages and drives the handlers. A handler
/// error leaves the message unacked so the queue redelivers it; only
/// successfully handled messages are removed.
pub struct IngestWorker {
    coordinator: Arc<LifecycleCoordinator>,
    summarizer: Arc<Summarizer>,
    scan_queue: Arc<DeliveryQueue<ScanMessage>>,
    summary_queue: Arc<DeliveryQueue<SummarizeMessage>>,
}

impl IngestWorker {
    pub fn new(
        coordinator: Arc<LifecycleCoordinator>,
        summarizer: Arc<Summarizer>,
        scan_queue: Arc<DeliveryQueue<ScanMessage>>,
        summary_queue: Arc<DeliveryQueue<SummarizeMessage>>,
    ) -> Self {
        Self {
            coordinator,
            summarizer,
            scan_queue,
            summary_queue,
        }
    }

    /// Handle at most one scan message. Returns whether one was received.
    pub async fn tick_scan(&self) -> bool {
        let Some(delivery) = self.scan_queue.receive() else {
            return false;
        };
        match self.coordinator.handle_scan_message(delivery.message).await {
            Ok(()) => {
                let _ = self.scan_queue.ack(delivery.receipt);
            }
            Err(e) => {
                error!(
                    graph_id = %delivery.message.graph_id,
                    receive_count = delivery.receive_count,
                    error = %e,
                    "scan invocation failed, leaving message for redelivery"
                );
            }
        }
        true
    }

    /// Handle at most one summarize message. Returns whether one was received.
    pub async fn tick_summarize(&self) -> bool {
        let Some(delivery) = self.summary_queue.receive() else {
            return false;
        };
        match self
            .summarizer
            .handle_summarize_message(delivery.message)
            .await
        {
            Ok(()) => {
                let _ = self.summary_queue.ack(delivery.receipt);
            }
            Err(e) => {
                error!(
                    graph_id = %delivery.message.graph_id,
                    receive_count = delivery.receive_count,
                    error = %e,
                    "summarize invocation failed, leaving message for redelivery"
                );
            }
        }
        true
    }

    pub async fn run(&self) {
        loop {
            let worked = self.tick_scan().await || self.tick_summarize().await;
            if !worked {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}
