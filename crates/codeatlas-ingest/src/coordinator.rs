use crate::scanner::{BatchScanner, SourceRegistry};
use crate::source::{filter_files, SourceOpener};
use codeatlas_core::{
    CodeAtlasError, CodeGraph, CreateGraphRequest, DescriptorIndexer, GraphFile, GraphFileStore,
    GraphId, GraphStatus, GraphStore, LifecycleStore, Result, ScanMessage, ScannerConfig,
    StallPolicy, SummarizeMessage,
};
use codeatlas_queue::DeliveryQueue;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Owns the graph lifecycle: creation, the scan-message loop with its
/// status guard and per-graph lease, deletion, and the read queries.
pub struct LifecycleCoordinator {
    lifecycle: Arc<dyn LifecycleStore>,
    files: Arc<dyn GraphFileStore>,
    graph: Arc<dyn GraphStore>,
    indexer: Arc<dyn DescriptorIndexer>,
    opener: Arc<dyn SourceOpener>,
    sources: Arc<SourceRegistry>,
    scanner: BatchScanner,
    scan_queue: Arc<DeliveryQueue<ScanMessage>>,
    summary_queue: Arc<DeliveryQueue<SummarizeMessage>>,
    config: ScannerConfig,
}

impl LifecycleCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lifecycle: Arc<dyn LifecycleStore>,
        files: Arc<dyn GraphFileStore>,
        graph: Arc<dyn GraphStore>,
        indexer: Arc<dyn DescriptorIndexer>,
        opener: Arc<dyn SourceOpener>,
        sources: Arc<SourceRegistry>,
        scanner: BatchScanner,
        scan_queue: Arc<DeliveryQueue<ScanMessage>>,
        summary_queue: Arc<DeliveryQueue<SummarizeMessage>>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            lifecycle,
            files,
            graph,
            indexer,
            opener,
            sources,
            scanner,
            scan_queue,
            summary_queue,
            config,
        }
    }

    /// Create the graph row, enumerate and persist its file list, advance to
    /// analysing, and dispatch the first scan message.
    pub async fn create_graph(&self, request: CreateGraphRequest) -> Result<CodeGraph> {
        if request.origin_url.trim().is_empty() || request.branch.trim().is_empty() {
            return Err(CodeAtlasError::InvalidOperation(
                "origin url and branch are required".to_string(),
            ));
        }

        let graph_id = Uuid::new_v4();
        let graph = CodeGraph {
            id: graph_id,
            origin_url: request.origin_url.clone(),
            branch: request.branch.clone(),
            sub_folder: request.sub_folder.clone(),
            file_filter: request.file_filter.clone(),
            status: GraphStatus::Downloading,
            deleted: false,
            update_time: Utc::now(),
        };
        self.lifecycle.save_graph(graph).await?;

        let source = self.opener.open(graph_id, &request).await?;
        self.sources.register(graph_id, source.clone());

        let enumerated = source.list_files().await?;
        let tracked = filter_files(enumerated, request.file_filter.as_deref())?;
        info!(graph_id = %graph_id, files = tracked.len(), "tracking repository files");
        self.files.save_files(graph_id, tracked).await?;

        self.lifecycle
            .update_status(graph_id, GraphStatus::Analysing)
            .await?;
        self.scan_queue.send(ScanMessage { graph_id });

        self.lifecycle
            .get_graph(graph_id)
            .await?
            .ok_or_else(|| CodeAtlasError::NotFound(format!("code graph {}", graph_id)))
    }

    /// Consume one scan message: guard on status, take the lease, process a
    /// bounded batch, then either re-enqueue or hand over to summarization.
    pub async fn handle_scan_message(&self, message: ScanMessage) -> Result<()> {
        let graph_id = message.graph_id;
        let graph = self
            .lifecycle
            .get_graph(graph_id)
            .await?
            .ok_or_else(|| CodeAtlasError::NotFound(format!("code graph {}", graph_id)))?;

        // A stale redelivery for a graph that already moved on is a no-op.
        if graph.deleted || graph.status != GraphStatus::Analysing {
            info!(graph_id = %graph_id, status = %graph.status, "graph not analysing, skip");
            return Ok(());
        }

        let ttl = Duration::from_secs(self.config.lease_ttl_secs);
        if !self.lifecycle.acquire_scan_lease(graph_id, ttl).await? {
            info!(graph_id = %graph_id, "scan lease held elsewhere, skip");
            return Ok(());
        }

        let outcome = self.scan_and_advance(message).await;
        self.lifecycle.release_scan_lease(graph_id).await?;
        outcome
    }

    async fn scan_and_advance(&self, message: ScanMessage) -> Result<()> {
        let graph_id = message.graph_id;
        let processed = self
            .scanner
            .process_batch(graph_id, self.config.batch_size)
            .await?;

        if processed == 0 {
            let remaining = self
                .files
                .list_files(graph_id)
                .await?
                .iter()
                .any(|f| !f.scanned);
            if remaining {
                match self.config.stall_policy {
                    StallPolicy::LogOnly => {
                        warn!(graph_id = %graph_id, "no files processed while files remain, stopping the loop");
                    }
                    StallPolicy::DeadLetter => {
                        warn!(graph_id = %graph_id, "no files processed while files remain, dead-lettering scan message");
                        self.scan_queue.send_to_dead_letter(message);
                    }
                }
            }
            return Ok(());
        }

        let all_scanned = self
            .files
            .list_files(graph_id)
            .await?
            .iter()
            .all(|f| f.scanned);

        if all_scanned {
            self.lifecycle
                .update_status(graph_id, GraphStatus::GraphCreating)
                .await?;
            self.summary_queue.send(SummarizeMessage { graph_id });
            info!(graph_id = %graph_id, "all files scanned, summarization dispatched");
        } else {
            self.scan_queue.send(ScanMessage { graph_id });
        }
        Ok(())
    }

    /// Purge graph-store and search-index data, then soft-delete the row.
    /// Safe to repeat.
    pub async fn delete_graph(&self, graph_id: GraphId) -> Result<()> {
        self.graph.delete_graph(graph_id).await?;
        self.indexer.delete_graph(graph_id).await?;
        self.lifecycle.mark_deleted(graph_id).await?;
        self.sources.remove(graph_id);
        info!(graph_id = %graph_id, "graph deleted");
        Ok(())
    }

    pub async fn list_graphs(&self) -> Result<Vec<CodeGraph>> {
        self.lifecycle.list_graphs().await
    }

    pub async fn graph_files(&self, graph_id: GraphId) -> Result<Vec<GraphFile>> {
        self.files.list_files(graph_id).await
    }

    pub async fn get_graph(&self, graph_id: GraphId) -> Result<Option<CodeGraph>> {
        self.lifecycle.get_graph(graph_id).await
    }
}
