use codeatlas_core::{GraphId, MetaDocument, MetaIndex, MetaMatch, Result, SearchIndex};
use async_trait::async_trait;
use dashmap::DashMap;

/// In-memory [`SearchIndex`]: documents keyed by (index, natural id),
/// nearest-neighbor query by cosine similarity.
pub struct MemorySearchIndex {
    documents: DashMap<(MetaIndex, String), MetaDocument>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    pub fn len(&self, index: MetaIndex) -> usize {
        self.documents.iter().filter(|e| e.key().0 == index).count()
    }

    pub fn is_empty(&self, index: MetaIndex) -> bool {
        self.len(index) == 0
    }

    pub fn get(&self, index: MetaIndex, id: &str) -> Option<MetaDocument> {
        self.documents
            .get(&(index, id.to_string()))
            .map(|d| d.clone())
    }
}

impl Default for MemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl SearchIndex for MemorySearchIndex {
    async fn upsert(&self, index: MetaIndex, id: &str, document: MetaDocument) -> Result<()> {
        self.documents.insert((index, id.to_string()), document);
        Ok(())
    }

    async fn query(
        &self,
        index: MetaIndex,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<MetaMatch>> {
        let mut scored: Vec<MetaMatch> = self
            .documents
            .iter()
            .filter(|entry| entry.key().0 == index)
            .map(|entry| {
                let doc = entry.value();
                MetaMatch {
                    id: entry.key().1.clone(),
                    score: cosine_similarity(embedding, &doc.embedding),
                    graph_id: doc.graph_id,
                    name: doc.name.clone(),
                    path: doc.path.clone(),
                    description: doc.description.clone(),
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_graph(&self, graph_id: GraphId) -> Result<()> {
        self.documents.retain(|_, doc| doc.graph_id != graph_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn doc(graph_id: GraphId, name: &str, embedding: Vec<f32>) -> MetaDocument {
        MetaDocument {
            graph_id,
            name: name.to_string(),
            path: "app".to_string(),
            description: format!("{} description", name),
            embedding,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_by_id() {
        let index = MemorySearchIndex::new();
        let graph_id = Uuid::new_v4();

        index
            .upsert(MetaIndex::Class, "g/app/A", doc(graph_id, "A", vec![1.0, 0.0]))
            .await
            .unwrap();
        index
            .upsert(MetaIndex::Class, "g/app/A", doc(graph_id, "A2", vec![0.0, 1.0]))
            .await
            .unwrap();

        assert_eq!(index.len(MetaIndex::Class), 1);
        assert_eq!(index.get(MetaIndex::Class, "g/app/A").unwrap().name, "A2");
    }

    #[tokio::test]
    async fn query_ranks_by_cosine_similarity() {
        let index = MemorySearchIndex::new();
        let graph_id = Uuid::new_v4();

        index
            .upsert(MetaIndex::Function, "1", doc(graph_id, "near", vec![1.0, 0.1]))
            .await
            .unwrap();
        index
            .upsert(MetaIndex::Function, "2", doc(graph_id, "far", vec![-1.0, 0.4]))
            .await
            .unwrap();
        index
            .upsert(MetaIndex::Class, "3", doc(graph_id, "other-index", vec![1.0, 0.0]))
            .await
            .unwrap();

        let matches = index
            .query(MetaIndex::Function, &[1.0, 0.0], 5)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].name, "near");
        assert!(matches[0].score > matches[1].score);
    }

    #[tokio::test]
    async fn delete_graph_removes_documents_across_indexes() {
        let index = MemorySearchIndex::new();
        let gone = Uuid::new_v4();
        let kept = Uuid::new_v4();

        index
            .upsert(MetaIndex::Class, "a", doc(gone, "A", vec![1.0]))
            .await
            .unwrap();
        index
            .upsert(MetaIndex::Function, "b", doc(gone, "B", vec![1.0]))
            .await
            .unwrap();
        index
            .upsert(MetaIndex::Path, "c", doc(kept, "C", vec![1.0]))
            .await
            .unwrap();

        index.delete_graph(gone).await.unwrap();

        assert_eq!(index.len(MetaIndex::Class), 0);
        assert_eq!(index.len(MetaIndex::Function), 0);
        assert_eq!(index.len(MetaIndex::Path), 1);
    }
}
