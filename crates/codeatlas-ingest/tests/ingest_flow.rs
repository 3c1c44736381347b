//! End-to-end ingestion over in-memory backends: create a graph, pump the
//! scan queue to completion, summarize, query, delete.

use codeatlas_core::{
    ClassDescriptor, CodeAtlasError, CreateGraphRequest, EdgeKind, Extraction, ExtractionClient,
    GraphFileStore, GraphId, GraphStatus, LifecycleStore, QueueConfig, RepositorySource, Result,
    ScanMessage, ScannerConfig, SummaryClient, VertexKey,
};
use codeatlas_graph::{EntityResolver, MemoryGraphStore};
use codeatlas_ingest::{
    BatchScanner, IngestWorker, LifecycleCoordinator, MemoryDescriptorArchive,
    MemoryGraphFileStore, MemoryLifecycleStore, SourceOpener, SourceRegistry, Summarizer,
};
use codeatlas_queue::DeliveryQueue;
use codeatlas_vector::{HashedEmbeddingProvider, MemorySearchIndex, MetaRag};
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

struct MapSource {
    files: BTreeMap<String, String>,
}

#[async_trait]
impl RepositorySource for MapSource {
    async fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    async fn read_file(&self, relative_path: &str) -> Result<String> {
        self.files
            .get(relative_path)
            .cloned()
            .ok_or_else(|| CodeAtlasError::NotFound(relative_path.to_string()))
    }
}

struct FixedOpener {
    source: Arc<dyn RepositorySource>,
}

#[async_trait]
impl SourceOpener for FixedOpener {
    async fn open(
        &self,
        _graph_id: GraphId,
        _request: &CreateGraphRequest,
    ) -> Result<Arc<dyn RepositorySource>> {
        Ok(self.source.clone())
    }
}

/// Extraction keyed by file path; unknown files are not code.
struct MapExtraction {
    descriptors: BTreeMap<String, Vec<ClassDescriptor>>,
}

#[async_trait]
impl ExtractionClient for MapExtraction {
    async fn extract(
        &self,
        _file_listing: &str,
        relative_path: &str,
        _content: &str,
    ) -> Result<Extraction> {
        Ok(match self.descriptors.get(relative_path) {
            Some(classes) => Extraction::Classes(classes.clone()),
            None => Extraction::NotCode,
        })
    }
}

struct FailingExtraction;

#[async_trait]
impl ExtractionClient for FailingExtraction {
    async fn extract(&self, _: &str, _: &str, _: &str) -> Result<Extraction> {
        Err(CodeAtlasError::Extraction("model unavailable".to_string()))
    }
}

struct CannedSummaries;

#[async_trait]
impl SummaryClient for CannedSummaries {
    async fn summarize_class(&self, _: &str) -> Result<String> {
        Ok("refined class description".to_string())
    }
    async fn summarize_path(&self, _: &str) -> Result<String> {
        Ok("path summary".to_string())
    }
}

fn descriptor(value: serde_json::Value) -> Vec<ClassDescriptor> {
    vec![serde_json::from_value(value).unwrap()]
}

/// `a.js` defines `foo` calling `Bar.baz` in `b.js`; `b.js` defines `Bar`.
fn scenario_descriptors() -> BTreeMap<String, Vec<ClassDescriptor>> {
    let mut map = BTreeMap::new();
    map.insert(
        "a.js".to_string(),
        descriptor(json!({
            "Class": {
                "Path": "src",
                "Name": "A",
                "FileExtension": "js",
                "Properties": [{"description": "Entry point calling into Bar."}]
            },
            "Functions": [
                {"Name": "foo", "Properties": [{"description": "Delegates to Bar.baz."}]}
            ],
            "OuterDependencies": [
                {"From": "foo", "To": {"Path": "src", "ClassName": "Bar", "Type": "function", "Name": "baz"}}
            ]
        })),
    );
    map.insert(
        "b.js".to_string(),
        descriptor(json!({
            "Class": {
                "Path": "src",
                "Name": "Bar",
                "FileExtension": "js",
                "Properties": [{"description": "Utility class with baz."}]
            },
            "Functions": [
                {"Name": "baz", "Properties": [{"description": "Does the actual work."}]}
            ]
        })),
    );
    map
}

struct Harness {
    worker: IngestWorker,
    coordinator: Arc<LifecycleCoordinator>,
    lifecycle: Arc<MemoryLifecycleStore>,
    files: Arc<MemoryGraphFileStore>,
    graph_store: Arc<MemoryGraphStore>,
    search_index: Arc<MemorySearchIndex>,
    scan_queue: Arc<DeliveryQueue<ScanMessage>>,
}

fn harness(
    extraction: Arc<dyn ExtractionClient>,
    scanner_config: ScannerConfig,
    queue_config: QueueConfig,
    source_files: &[(&str, &str)],
) -> Harness {
    let lifecycle = Arc::new(MemoryLifecycleStore::new());
    let files = Arc::new(MemoryGraphFileStore::new());
    let graph_store = Arc::new(MemoryGraphStore::new());
    let search_index = Arc::new(MemorySearchIndex::new());
    let archive = Arc::new(MemoryDescriptorArchive::new());
    let indexer = Arc::new(MetaRag::new(
        search_index.clone(),
        Arc::new(HashedEmbeddingProvider::new(64)),
    ));
    let sources = Arc::new(SourceRegistry::new());
    let resolver = Arc::new(EntityResolver::new(graph_store.clone(), indexer.clone()));
    let scanner = BatchScanner::new(
        files.clone(),
        sources.clone(),
        extraction,
        resolver,
        archive.clone(),
    );
    let scan_queue = Arc::new(DeliveryQueue::new(queue_config.clone()));
    let summary_queue = Arc::new(DeliveryQueue::new(queue_config));

    let source = Arc::new(MapSource {
        files: source_files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect(),
    });

    let coordinator = Arc::new(LifecycleCoordinator::new(
        lifecycle.clone(),
        files.clone(),
        graph_store.clone(),
        indexer.clone(),
        Arc::new(FixedOpener { source }),
        sources,
        scanner,
        scan_queue.clone(),
        summary_queue.clone(),
        scanner_config,
    ));
    let summarizer = Arc::new(Summarizer::new(
        lifecycle.clone(),
        archive,
        graph_store.clone(),
        indexer,
        Arc::new(CannedSummaries),
    ));
    let worker = IngestWorker::new(
        coordinator.clone(),
        summarizer,
        scan_queue.clone(),
        summary_queue,
    );

    Harness {
        worker,
        coordinator,
        lifecycle,
        files,
        graph_store,
        search_index,
        scan_queue,
    }
}

fn scenario_harness(batch_size: usize) -> Harness {
    harness(
        Arc::new(MapExtraction {
            descriptors: scenario_descriptors(),
        }),
        ScannerConfig {
            batch_size,
            ..ScannerConfig::default()
        },
        QueueConfig::default(),
        &[("README.md", "# readme"), ("a.js", "foo()"), ("b.js", "baz()")],
    )
}

async fn pump_scans(harness: &Harness) -> usize {
    let mut handled = 0;
    while harness.worker.tick_scan().await {
        handled += 1;
        assert!(handled < 100, "scan loop did not terminate");
    }
    handled
}

#[tokio::test]
async fn repository_ingests_to_a_created_graph() {
    let harness = scenario_harness(1);
    let graph = harness
        .coordinator
        .create_graph(CreateGraphRequest {
            origin_url: "https://github.com/acme/widgets".to_string(),
            branch: "main".to_string(),
            sub_folder: None,
            file_filter: None,
        })
        .await
        .unwrap();
    assert_eq!(graph.status, GraphStatus::Analysing);

    // Batch size 1 forces one self-re-enqueued invocation per file.
    let invocations = pump_scans(&harness).await;
    assert_eq!(invocations, 3);

    let rows = harness.files.list_files(graph.id).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|f| f.scanned));

    let row = harness.lifecycle.get_graph(graph.id).await.unwrap().unwrap();
    assert_eq!(row.status, GraphStatus::GraphCreating);

    // Exactly one Bar class, stub merged with real properties.
    let bar = harness
        .graph_store
        .vertex(&VertexKey::Class {
            graph_id: graph.id,
            path: "src".to_string(),
            name: "Bar".to_string(),
        })
        .unwrap();
    assert_eq!(
        bar.properties.get("description").map(String::as_str),
        Some("Utility class with baz.")
    );

    // foo -> baz call edge exists exactly once.
    let calls: Vec<_> = harness
        .graph_store
        .edge_keys(graph.id)
        .into_iter()
        .filter(|(kind, _, _)| *kind == EdgeKind::Call)
        .collect();
    assert_eq!(calls.len(), 1);

    // Summarization finishes the lifecycle.
    assert!(harness.worker.tick_summarize().await);
    let row = harness.lifecycle.get_graph(graph.id).await.unwrap().unwrap();
    assert_eq!(row.status, GraphStatus::Created);

    // A redelivered scan message after completion is a silent no-op.
    harness.scan_queue.send(ScanMessage { graph_id: graph.id });
    assert!(harness.worker.tick_scan().await);
    let row = harness.lifecycle.get_graph(graph.id).await.unwrap().unwrap();
    assert_eq!(row.status, GraphStatus::Created);
}

#[tokio::test]
async fn batch_size_does_not_change_the_outcome() {
    for batch_size in [1, 2, 15] {
        let harness = scenario_harness(batch_size);
        let graph = harness
            .coordinator
            .create_graph(CreateGraphRequest {
                origin_url: "https://github.com/acme/widgets".to_string(),
                branch: "main".to_string(),
                sub_folder: None,
                file_filter: None,
            })
            .await
            .unwrap();

        pump_scans(&harness).await;

        let rows = harness.files.list_files(graph.id).await.unwrap();
        assert!(rows.iter().all(|f| f.scanned), "batch size {}", batch_size);
        // README.md contributed nothing; the two source files produce
        // Path(src), Class(A), Class(Bar), Function(foo), Function(baz).
        assert_eq!(harness.graph_store.vertex_count(graph.id), 5);
    }
}

#[tokio::test]
async fn delete_purges_graph_and_index_data() {
    let harness = scenario_harness(15);
    let graph = harness
        .coordinator
        .create_graph(CreateGraphRequest {
            origin_url: "https://github.com/acme/widgets".to_string(),
            branch: "main".to_string(),
            sub_folder: None,
            file_filter: None,
        })
        .await
        .unwrap();
    pump_scans(&harness).await;

    harness.coordinator.delete_graph(graph.id).await.unwrap();
    // Idempotent.
    harness.coordinator.delete_graph(graph.id).await.unwrap();

    assert!(harness.coordinator.list_graphs().await.unwrap().is_empty());
    assert_eq!(harness.graph_store.vertex_count(graph.id), 0);
    for index in codeatlas_core::MetaIndex::ALL {
        assert!(harness.search_index.is_empty(index));
    }
}

#[tokio::test]
async fn rejects_requests_without_origin() {
    let harness = scenario_harness(15);
    let err = harness
        .coordinator
        .create_graph(CreateGraphRequest {
            origin_url: "  ".to_string(),
            branch: "main".to_string(),
            sub_folder: None,
            file_filter: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CodeAtlasError::InvalidOperation(_)));
}

#[tokio::test(start_paused = true)]
async fn persistent_extraction_failure_dead_letters_the_scan_message() {
    let harness = harness(
        Arc::new(FailingExtraction),
        ScannerConfig::default(),
        QueueConfig {
            visibility_timeout_secs: 1,
            max_receive_count: 2,
        },
        &[("a.js", "foo()")],
    );
    let graph = harness
        .coordinator
        .create_graph(CreateGraphRequest {
            origin_url: "https://github.com/acme/widgets".to_string(),
            branch: "main".to_string(),
            sub_folder: None,
            file_filter: None,
        })
        .await
        .unwrap();

    // Each delivery fails and stays unacked; after the receive bound the
    // message parks in the dead-letter buffer instead of looping forever.
    for _ in 0..2 {
        assert!(harness.worker.tick_scan().await);
        tokio::time::advance(std::time::Duration::from_secs(2)).await;
    }
    assert!(!harness.worker.tick_scan().await);

    let dead = harness.scan_queue.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].graph_id, graph.id);

    // Nothing was marked scanned along the way.
    let rows = harness.files.list_files(graph.id).await.unwrap();
    assert!(rows.iter().all(|f| !f.scanned));
}
