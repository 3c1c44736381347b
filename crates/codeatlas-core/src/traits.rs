use crate::{
    ClassDescriptor, CodeGraph, EdgeKind, GraphFile, GraphId, GraphStatus, MetaDocument,
    MetaIndex, MetaMatch, Result, VertexId, VertexKey,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Outcome of running the extraction model over one file.
#[derive(Debug, Clone)]
pub enum Extraction {
    /// The content is not analyzable source code; no graph mutation follows.
    NotCode,
    Classes(Vec<ClassDescriptor>),
}

/// Property-graph backend. Both operations are idempotent: the natural key,
/// not the returned id, identifies a vertex, and at most one edge of a kind
/// exists per ordered vertex pair.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Return the vertex for `key`, creating it if absent. `extra_properties`
    /// are merged last-write-wins over any existing properties.
    async fn find_or_create_vertex(
        &self,
        key: &VertexKey,
        extra_properties: &BTreeMap<String, String>,
    ) -> Result<VertexId>;

    async fn find_or_create_edge(&self, kind: EdgeKind, from: VertexId, to: VertexId)
        -> Result<()>;

    /// Write a description property onto the vertex for `key`, creating the
    /// vertex if it does not exist yet.
    async fn set_vertex_description(&self, key: &VertexKey, description: &str) -> Result<()>;

    async fn delete_graph(&self, graph_id: GraphId) -> Result<()>;
}

/// Vector search backend over the meta indexes.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn upsert(&self, index: MetaIndex, id: &str, document: MetaDocument) -> Result<()>;

    async fn query(&self, index: MetaIndex, embedding: &[f32], k: usize)
        -> Result<Vec<MetaMatch>>;

    async fn delete_graph(&self, graph_id: GraphId) -> Result<()>;
}

/// Table of [`CodeGraph`] rows plus the per-graph scan lease.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    async fn save_graph(&self, graph: CodeGraph) -> Result<()>;

    async fn get_graph(&self, id: GraphId) -> Result<Option<CodeGraph>>;

    /// All rows not marked deleted.
    async fn list_graphs(&self) -> Result<Vec<CodeGraph>>;

    /// Advance the status. Rejects transitions that are not legal per
    /// [`GraphStatus::can_advance_to`].
    async fn update_status(&self, id: GraphId, status: GraphStatus) -> Result<()>;

    /// Soft delete: the row stays, `deleted` flips. Idempotent.
    async fn mark_deleted(&self, id: GraphId) -> Result<()>;

    /// Conditionally take the single-writer lease for `id`. Returns false if
    /// another holder has it and the lease has not expired.
    async fn acquire_scan_lease(&self, id: GraphId, ttl: Duration) -> Result<bool>;

    async fn release_scan_lease(&self, id: GraphId) -> Result<()>;
}

/// Table of per-file scan state, partitioned by graph id.
#[async_trait]
pub trait GraphFileStore: Send + Sync {
    async fn save_files(&self, graph_id: GraphId, full_paths: Vec<String>) -> Result<()>;

    /// Stable order as persisted; the scanner relies on it for bounded
    /// batch selection.
    async fn list_files(&self, graph_id: GraphId) -> Result<Vec<GraphFile>>;

    async fn mark_scanned(&self, graph_id: GraphId, full_path: &str) -> Result<()>;
}

/// External text-generation model turning file content into descriptors.
/// Transient failures propagate; the implementation retries throttling with
/// backoff before giving up.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn extract(
        &self,
        file_listing: &str,
        relative_path: &str,
        content: &str,
    ) -> Result<Extraction>;
}

/// Text-generation model used by the summarization stage.
#[async_trait]
pub trait SummaryClient: Send + Sync {
    async fn summarize_class(&self, class_outline: &str) -> Result<String>;

    async fn summarize_path(&self, path_outline: &str) -> Result<String>;
}

/// Mirror of summarizable entities into the search indexes. Best-effort from
/// the resolver's point of view: failures are logged, never fatal.
#[async_trait]
pub trait DescriptorIndexer: Send + Sync {
    async fn index_classes(&self, graph_id: GraphId, classes: &[ClassDescriptor]) -> Result<()>;

    async fn index_functions(&self, graph_id: GraphId, classes: &[ClassDescriptor]) -> Result<()>;

    async fn index_class(
        &self,
        graph_id: GraphId,
        name: &str,
        path: &str,
        description: &str,
    ) -> Result<()>;

    async fn index_path(
        &self,
        graph_id: GraphId,
        name: &str,
        full_path: &str,
        description: &str,
    ) -> Result<()>;

    async fn delete_graph(&self, graph_id: GraphId) -> Result<()>;
}

/// Per-file extraction results kept for the summarization stage, keyed by
/// graph id and file path. Saving the same path again replaces the entry.
#[async_trait]
pub trait DescriptorArchive: Send + Sync {
    async fn save(
        &self,
        graph_id: GraphId,
        full_path: &str,
        classes: &[ClassDescriptor],
    ) -> Result<()>;

    /// Every archived file's class list, in insertion order.
    async fn list(&self, graph_id: GraphId) -> Result<Vec<Vec<ClassDescriptor>>>;
}

/// Read access to the checked-out repository being ingested.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Repository-relative paths of every file under the selected subfolder.
    async fn list_files(&self) -> Result<Vec<String>>;

    async fn read_file(&self, relative_path: &str) -> Result<String>;
}
