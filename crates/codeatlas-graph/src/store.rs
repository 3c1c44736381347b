use codeatlas_core::{EdgeKind, GraphId, GraphStore, Result, VertexId, VertexKey};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Materialized vertex: its key plus the merged property bag.
#[derive(Debug, Clone)]
pub struct VertexRecord {
    pub id: VertexId,
    pub key: VertexKey,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EdgeRef {
    kind: EdgeKind,
    from: VertexId,
    to: VertexId,
}

/// In-memory [`GraphStore`] keyed by natural keys. Lookup and creation are a
/// single map-entry operation, so duplicate delivery of the same key always
/// lands on the same vertex.
pub struct MemoryGraphStore {
    next_id: AtomicU64,
    ids: DashMap<VertexKey, VertexId>,
    records: DashMap<VertexId, VertexRecord>,
    edges: DashMap<EdgeRef, ()>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ids: DashMap::new(),
            records: DashMap::new(),
            edges: DashMap::new(),
        }
    }

    pub fn vertex(&self, key: &VertexKey) -> Option<VertexRecord> {
        let id = *self.ids.get(key)?;
        self.records.get(&id).map(|r| r.clone())
    }

    pub fn vertex_count(&self, graph_id: GraphId) -> usize {
        self.records
            .iter()
            .filter(|r| r.key.graph_id() == graph_id)
            .count()
    }

    pub fn edge_count(&self, graph_id: GraphId) -> usize {
        self.edge_keys(graph_id).len()
    }

    /// Edges as (kind, from-key, to-key) triples, for structural comparison.
    pub fn edge_keys(&self, graph_id: GraphId) -> Vec<(EdgeKind, VertexKey, VertexKey)> {
        self.edges
            .iter()
            .filter_map(|entry| {
                let edge = *entry.key();
                let from = self.records.get(&edge.from)?.key.clone();
                let to = self.records.get(&edge.to)?.key.clone();
                if from.graph_id() != graph_id {
                    return None;
                }
                Some((edge.kind, from, to))
            })
            .collect()
    }
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn find_or_create_vertex(
        &self,
        key: &VertexKey,
        extra_properties: &BTreeMap<String, String>,
    ) -> Result<VertexId> {
        let id = match self.ids.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => *entry.get(),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                entry.insert(id);
                debug!(kind = %key.kind(), name = key.name(), "created vertex");
                id
            }
        };
        self.records.entry(id).or_insert_with(|| VertexRecord {
            id,
            key: key.clone(),
            properties: key.intrinsic_properties(),
        });

        if !extra_properties.is_empty() {
            if let Some(mut record) = self.records.get_mut(&id) {
                for (k, v) in extra_properties {
                    record.properties.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(id)
    }

    async fn find_or_create_edge(
        &self,
        kind: EdgeKind,
        from: VertexId,
        to: VertexId,
    ) -> Result<()> {
        self.edges.insert(EdgeRef { kind, from, to }, ());
        Ok(())
    }

    async fn set_vertex_description(&self, key: &VertexKey, description: &str) -> Result<()> {
        let mut props = BTreeMap::new();
        props.insert("description".to_string(), description.to_string());
        self.find_or_create_vertex(key, &props).await?;
        Ok(())
    }

    async fn delete_graph(&self, graph_id: GraphId) -> Result<()> {
        let doomed: Vec<VertexId> = self
            .records
            .iter()
            .filter(|r| r.key.graph_id() == graph_id)
            .map(|r| r.id)
            .collect();

        // Vertices never cross graphs, so an edge is gone when its source is.
        self.edges
            .retain(|edge, _| !doomed.contains(&edge.from) && !doomed.contains(&edge.to));
        for id in &doomed {
            self.records.remove(id);
        }
        self.ids.retain(|key, _| key.graph_id() != graph_id);
        Ok(())
    }
}
