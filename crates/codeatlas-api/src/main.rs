use codeatlas_api::{AppState, Server};
use codeatlas_core::{ScanMessage, Settings, SummarizeMessage};
use codeatlas_extract::{LlmClient, LlmExtractionClient, LlmSummaryClient};
use codeatlas_graph::{EntityResolver, MemoryGraphStore};
use codeatlas_ingest::{
    BatchScanner, GitSourceOpener, IngestWorker, LifecycleCoordinator, MemoryDescriptorArchive,
    MemoryGraphFileStore, MemoryLifecycleStore, SourceRegistry, Summarizer,
};
use codeatlas_queue::DeliveryQueue;
use codeatlas_vector::{HttpEmbeddingProvider, MemorySearchIndex, MetaRag};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> codeatlas_core::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codeatlas=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;

    let lifecycle = Arc::new(MemoryLifecycleStore::new());
    let files = Arc::new(MemoryGraphFileStore::new());
    let graph_store = Arc::new(MemoryGraphStore::new());
    let search_index = Arc::new(MemorySearchIndex::new());
    let archive = Arc::new(MemoryDescriptorArchive::new());
    let sources = Arc::new(SourceRegistry::new());

    let embeddings = Arc::new(HttpEmbeddingProvider::new(settings.embedding.clone())?);
    let indexer = Arc::new(MetaRag::new(search_index.clone(), embeddings.clone()));
    let extraction = Arc::new(LlmExtractionClient::new(LlmClient::new(
        settings.extraction.clone(),
    )?));
    let summary = Arc::new(LlmSummaryClient::new(LlmClient::new(
        settings.extraction.clone(),
    )?));

    let resolver = Arc::new(EntityResolver::new(graph_store.clone(), indexer.clone()));
    let scanner = BatchScanner::new(
        files.clone(),
        sources.clone(),
        extraction,
        resolver,
        archive.clone(),
    );

    let scan_queue = Arc::new(DeliveryQueue::<ScanMessage>::new(settings.queue.clone()));
    let summary_queue = Arc::new(DeliveryQueue::<SummarizeMessage>::new(settings.queue.clone()));

    let opener = Arc::new(GitSourceOpener::new(std::env::temp_dir().join("codeatlas")));
    let coordinator = Arc::new(LifecycleCoordinator::new(
        lifecycle.clone(),
        files,
        graph_store.clone(),
        indexer.clone(),
        opener,
        sources,
        scanner,
        scan_queue.clone(),
        summary_queue.clone(),
        settings.scanner.clone(),
    ));
    let summarizer = Arc::new(Summarizer::new(
        lifecycle,
        archive,
        graph_store,
        indexer,
        summary,
    ));

    let worker = Arc::new(IngestWorker::new(
        coordinator.clone(),
        summarizer,
        scan_queue,
        summary_queue,
    ));
    tokio::spawn({
        let worker = worker.clone();
        async move { worker.run().await }
    });

    let state = AppState::new(coordinator, search_index, embeddings);
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| {
            codeatlas_core::CodeAtlasError::Configuration(format!("bad listen address: {}", e))
        })?;
    Server::new(addr, state).run().await
}
