use codeatlas_core::{
    ClassDescriptor, CodeAtlasError, CodeGraph, DescriptorArchive, GraphFile, GraphFileStore,
    GraphId, GraphStatus, LifecycleStore, Result,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// In-memory [`LifecycleStore`]: one row per graph plus the scan leases.
pub struct MemoryLifecycleStore {
    graphs: DashMap<GraphId, CodeGraph>,
    leases: Mutex<HashMap<GraphId, Instant>>,
}

impl MemoryLifecycleStore {
    pub fn new() -> Self {
        Self {
            graphs: DashMap::new(),
            leases: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryLifecycleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleStore for MemoryLifecycleStore {
    async fn save_graph(&self, graph: CodeGraph) -> Result<()> {
        self.graphs.insert(graph.id, graph);
        Ok(())
    }

    async fn get_graph(&self, id: GraphId) -> Result<Option<CodeGraph>> {
        Ok(self.graphs.get(&id).map(|g| g.clone()))
    }

    async fn list_graphs(&self) -> Result<Vec<CodeGraph>> {
        Ok(self
            .graphs
            .iter()
            .filter(|g| !g.deleted)
            .map(|g| g.clone())
            .collect())
    }

    async fn update_status(&self, id: GraphId, status: GraphStatus) -> Result<()> {
        let mut graph = self
            .graphs
            .get_mut(&id)
            .ok_or_else(|| CodeAtlasError::NotFound(format!("code graph {}", id)))?;
        if !graph.status.can_advance_to(status) {
            return Err(CodeAtlasError::InvalidOperation(format!(
                "illegal status transition {} -> {}",
                graph.status, status
            )));
        }
        info!(graph_id = %id, from = %graph.status, to = %status, "graph status advanced");
        graph.status = status;
        graph.update_time = Utc::now();
        Ok(())
    }

    async fn mark_deleted(&self, id: GraphId) -> Result<()> {
        let mut graph = self
            .graphs
            .get_mut(&id)
            .ok_or_else(|| CodeAtlasError::NotFound(format!("code graph {}", id)))?;
        graph.deleted = true;
        graph.update_time = Utc::now();
        Ok(())
    }

    async fn acquire_scan_lease(&self, id: GraphId, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut leases = self.leases.lock();
        if let Some(expiry) = leases.get(&id) {
            if *expiry > now {
                debug!(graph_id = %id, "scan lease already held");
                return Ok(false);
            }
        }
        leases.insert(id, now + ttl);
        Ok(true)
    }

    async fn release_scan_lease(&self, id: GraphId) -> Result<()> {
        self.leases.lock().remove(&id);
        Ok(())
    }
}

/// In-memory [`GraphFileStore`]; rows keep insertion order, which is the
/// stable order the scanner's batch selection relies on.
pub struct MemoryGraphFileStore {
    files: DashMap<GraphId, Vec<GraphFile>>,
}

impl MemoryGraphFileStore {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
        }
    }
}

impl Default for MemoryGraphFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphFileStore for MemoryGraphFileStore {
    async fn save_files(&self, graph_id: GraphId, full_paths: Vec<String>) -> Result<()> {
        let mut rows = self.files.entry(graph_id).or_default();
        for full_path in full_paths {
            rows.push(GraphFile {
                graph_id,
                full_path,
                scanned: false,
            });
        }
        Ok(())
    }

    async fn list_files(&self, graph_id: GraphId) -> Result<Vec<GraphFile>> {
        Ok(self
            .files
            .get(&graph_id)
            .map(|rows| rows.clone())
            .unwrap_or_default())
    }

    async fn mark_scanned(&self, graph_id: GraphId, full_path: &str) -> Result<()> {
        debug!(graph_id = %graph_id, full_path, "marking file as scanned");
        let mut rows = self
            .files
            .get_mut(&graph_id)
            .ok_or_else(|| CodeAtlasError::NotFound(format!("files for graph {}", graph_id)))?;
        let row = rows
            .iter_mut()
            .find(|f| f.full_path == full_path)
            .ok_or_else(|| CodeAtlasError::NotFound(format!("file {}", full_path)))?;
        row.scanned = true;
        Ok(())
    }
}

/// In-memory [`DescriptorArchive`], one entry per scanned file.
pub struct MemoryDescriptorArchive {
    entries: DashMap<GraphId, Vec<(String, Vec<ClassDescriptor>)>>,
}

impl MemoryDescriptorArchive {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for MemoryDescriptorArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DescriptorArchive for MemoryDescriptorArchive {
    async fn save(
        &self,
        graph_id: GraphId,
        full_path: &str,
        classes: &[ClassDescriptor],
    ) -> Result<()> {
        let mut entries = self.entries.entry(graph_id).or_default();
        if let Some(existing) = entries.iter_mut().find(|(path, _)| path == full_path) {
            existing.1 = classes.to_vec();
        } else {
            entries.push((full_path.to_string(), classes.to_vec()));
        }
        Ok(())
    }

    async fn list(&self, graph_id: GraphId) -> Result<Vec<Vec<ClassDescriptor>>> {
        Ok(self
            .entries
            .get(&graph_id)
            .map(|entries| entries.iter().map(|(_, classes)| classes.clone()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn graph(id: GraphId) -> CodeGraph {
        CodeGraph {
            id,
            origin_url: "https://github.com/acme/widgets".to_string(),
            branch: "main".to_string(),
            sub_folder: None,
            file_filter: None,
            status: GraphStatus::Downloading,
            deleted: false,
            update_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn illegal_transitions_are_rejected() {
        let store = MemoryLifecycleStore::new();
        let id = Uuid::new_v4();
        store.save_graph(graph(id)).await.unwrap();

        store.update_status(id, GraphStatus::Analysing).await.unwrap();
        let err = store.update_status(id, GraphStatus::Created).await.unwrap_err();
        assert!(matches!(err, CodeAtlasError::InvalidOperation(_)));

        // Re-firing the same transition is also illegal, not silently ok.
        store
            .update_status(id, GraphStatus::GraphCreating)
            .await
            .unwrap();
        assert!(store
            .update_status(id, GraphStatus::GraphCreating)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn deleted_graphs_drop_out_of_listing_but_stay_readable() {
        let store = MemoryLifecycleStore::new();
        let id = Uuid::new_v4();
        store.save_graph(graph(id)).await.unwrap();

        store.mark_deleted(id).await.unwrap();
        store.mark_deleted(id).await.unwrap();

        assert!(store.list_graphs().await.unwrap().is_empty());
        let row = store.get_graph(id).await.unwrap().unwrap();
        assert!(row.deleted);
    }

    #[tokio::test(start_paused = true)]
    async fn scan_lease_is_exclusive_until_released_or_expired() {
        let store = MemoryLifecycleStore::new();
        let id = Uuid::new_v4();
        let ttl = Duration::from_secs(60);

        assert!(store.acquire_scan_lease(id, ttl).await.unwrap());
        assert!(!store.acquire_scan_lease(id, ttl).await.unwrap());

        store.release_scan_lease(id).await.unwrap();
        assert!(store.acquire_scan_lease(id, ttl).await.unwrap());

        // An abandoned lease expires on its own.
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.acquire_scan_lease(id, ttl).await.unwrap());
    }

    #[tokio::test]
    async fn files_keep_insertion_order_and_flip_scanned_once() {
        let store = MemoryGraphFileStore::new();
        let id = Uuid::new_v4();
        store
            .save_files(id, vec!["b.js".to_string(), "a.js".to_string()])
            .await
            .unwrap();

        store.mark_scanned(id, "b.js").await.unwrap();

        let rows = store.list_files(id).await.unwrap();
        assert_eq!(rows[0].full_path, "b.js");
        assert!(rows[0].scanned);
        assert_eq!(rows[1].full_path, "a.js");
        assert!(!rows[1].scanned);

        assert!(store.mark_scanned(id, "missing.js").await.is_err());
    }
}
