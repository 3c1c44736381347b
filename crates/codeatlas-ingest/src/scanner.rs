use codeatlas_core::{
    CodeAtlasError, DescriptorArchive, Extraction, ExtractionClient, GraphFileStore, GraphId,
    RepositorySource, Result,
};
use codeatlas_graph::EntityResolver;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Open checkouts by graph id, registered when a graph is created and looked
/// up by every later scan invocation.
pub struct SourceRegistry {
    sources: DashMap<GraphId, Arc<dyn RepositorySource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: DashMap::new(),
        }
    }

    pub fn register(&self, graph_id: GraphId, source: Arc<dyn RepositorySource>) {
        self.sources.insert(graph_id, source);
    }

    pub fn get(&self, graph_id: GraphId) -> Result<Arc<dyn RepositorySource>> {
        self.sources
            .get(&graph_id)
            .map(|s| s.clone())
            .ok_or_else(|| {
                CodeAtlasError::Database(format!("no repository checkout for graph {}", graph_id))
            })
    }

    pub fn remove(&self, graph_id: GraphId) {
        self.sources.remove(&graph_id);
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Advances a bounded batch of unscanned files for one graph. Extracted and
/// not-code outcomes both count as progress; transient failures are not
/// caught here and abort the invocation, leaving already-marked files marked.
pub struct BatchScanner {
    files: Arc<dyn GraphFileStore>,
    sources: Arc<SourceRegistry>,
    extraction: Arc<dyn ExtractionClient>,
    resolver: Arc<EntityResolver>,
    archive: Arc<dyn DescriptorArchive>,
}

impl BatchScanner {
    pub fn new(
        files: Arc<dyn GraphFileStore>,
        sources: Arc<SourceRegistry>,
        extraction: Arc<dyn ExtractionClient>,
        resolver: Arc<EntityResolver>,
        archive: Arc<dyn DescriptorArchive>,
    ) -> Self {
        Self {
            files,
            sources,
            extraction,
            resolver,
            archive,
        }
    }

    pub async fn process_batch(&self, graph_id: GraphId, max_files: usize) -> Result<usize> {
        let source = self.sources.get(graph_id)?;
        let all_files = self.files.list_files(graph_id).await?;
        let listing = all_files
            .iter()
            .map(|f| f.full_path.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let batch: Vec<String> = all_files
            .iter()
            .filter(|f| !f.scanned)
            .take(max_files)
            .map(|f| f.full_path.clone())
            .collect();

        let mut processed = 0;
        for full_path in batch {
            info!(graph_id = %graph_id, file = %full_path, "processing file");
            let content = source.read_file(&full_path).await?;

            match self.extraction.extract(&listing, &full_path, &content).await? {
                Extraction::Classes(classes) => {
                    self.archive.save(graph_id, &full_path, &classes).await?;
                    self.resolver.apply(graph_id, &classes).await?;
                }
                Extraction::NotCode => {
                    info!(file = %full_path, "file skipped during scanning, marking as processed");
                }
            }
            self.files.mark_scanned(graph_id, &full_path).await?;
            processed += 1;
        }

        Ok(processed)
    }
}
