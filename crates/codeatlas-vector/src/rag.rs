use crate::EmbeddingProvider;
use codeatlas_core::{
    ClassDescriptor, DescriptorIndexer, GraphId, MetaDocument, MetaIndex, Result, SearchIndex,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Mirrors class, function, and path descriptions into the meta indexes,
/// embedding each description on the way in. Document ids reuse the graph's
/// natural keys so repeated mirroring overwrites instead of duplicating.
pub struct MetaRag {
    index: Arc<dyn SearchIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl MetaRag {
    pub fn new(index: Arc<dyn SearchIndex>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, embeddings }
    }

    async fn upsert(
        &self,
        meta: MetaIndex,
        id: String,
        graph_id: GraphId,
        name: &str,
        path: &str,
        description: &str,
    ) -> Result<()> {
        let embedding = self.embeddings.embed(description).await?;
        self.index
            .upsert(
                meta,
                &id,
                MetaDocument {
                    graph_id,
                    name: name.to_string(),
                    path: path.to_string(),
                    description: description.to_string(),
                    embedding,
                },
            )
            .await
    }
}

#[async_trait]
impl DescriptorIndexer for MetaRag {
    async fn index_classes(&self, graph_id: GraphId, classes: &[ClassDescriptor]) -> Result<()> {
        for descriptor in classes {
            let Some(class) = descriptor.declared_class() else {
                continue;
            };
            if class.properties.is_empty() {
                continue;
            }
            let description = class.description().unwrap_or_else(|| class.name.clone());
            let id = format!("{}/{}/{}", graph_id, class.path, class.name);
            debug!(id = %id, "mirroring class meta");
            self.upsert(MetaIndex::Class, id, graph_id, &class.name, &class.path, &description)
                .await?;
        }
        Ok(())
    }

    async fn index_functions(&self, graph_id: GraphId, classes: &[ClassDescriptor]) -> Result<()> {
        for descriptor in classes {
            let Some(class) = descriptor.declared_class() else {
                continue;
            };
            let full_class_name = class.full_name();
            for function in &descriptor.functions {
                if function.name.is_empty() || function.properties.is_empty() {
                    continue;
                }
                let description = function
                    .description()
                    .unwrap_or_else(|| function.name.clone());
                let id = format!("{}/{}/{}", graph_id, full_class_name, function.name);
                self.upsert(
                    MetaIndex::Function,
                    id,
                    graph_id,
                    &function.name,
                    &full_class_name,
                    &description,
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn index_class(
        &self,
        graph_id: GraphId,
        name: &str,
        path: &str,
        description: &str,
    ) -> Result<()> {
        let id = format!("{}/{}/{}", graph_id, path, name);
        self.upsert(MetaIndex::Class, id, graph_id, name, path, description)
            .await
    }

    async fn index_path(
        &self,
        graph_id: GraphId,
        name: &str,
        full_path: &str,
        description: &str,
    ) -> Result<()> {
        let id = format!("{}/{}", graph_id, full_path);
        self.upsert(MetaIndex::Path, id, graph_id, name, full_path, description)
            .await
    }

    async fn delete_graph(&self, graph_id: GraphId) -> Result<()> {
        self.index.delete_graph(graph_id).await
    }
}
