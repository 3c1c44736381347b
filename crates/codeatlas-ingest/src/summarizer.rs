use codeatlas_core::{
    CodeAtlasError, DescriptorArchive, DescriptorIndexer, GraphId, GraphStatus, GraphStore,
    LifecycleStore, Result, SummarizeMessage, SummaryClient, VertexKey,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct PathNode {
    packages: BTreeMap<String, PathNode>,
    classes: BTreeMap<String, ClassSummary>,
}

#[derive(Debug, Clone)]
struct ClassSummary {
    description: String,
    functions: BTreeMap<String, String>,
}

fn insert_class(root: &mut PathNode, path: &str, name: &str, summary: ClassSummary) {
    let mut node = root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        node = node.packages.entry(segment.to_string()).or_default();
    }
    node.classes.insert(name.to_string(), summary);
}

/// Downstream stage behind the batch scanner: refines class descriptions,
/// summarizes every path bottom-up from its children, writes descriptions
/// onto Path vertices and into the meta indexes, then finishes the graph.
pub struct Summarizer {
    lifecycle: Arc<dyn LifecycleStore>,
    archive: Arc<dyn DescriptorArchive>,
    graph: Arc<dyn GraphStore>,
    indexer: Arc<dyn DescriptorIndexer>,
    summary: Arc<dyn SummaryClient>,
}

impl Summarizer {
    pub fn new(
        lifecycle: Arc<dyn LifecycleStore>,
        archive: Arc<dyn DescriptorArchive>,
        graph: Arc<dyn GraphStore>,
        indexer: Arc<dyn DescriptorIndexer>,
        summary: Arc<dyn SummaryClient>,
    ) -> Self {
        Self {
            lifecycle,
            archive,
            graph,
            indexer,
            summary,
        }
    }

    pub async fn handle_summarize_message(&self, message: SummarizeMessage) -> Result<()> {
        let graph_id = message.graph_id;
        let graph = self
            .lifecycle
            .get_graph(graph_id)
            .await?
            .ok_or_else(|| CodeAtlasError::NotFound(format!("code graph {}", graph_id)))?;

        if graph.deleted || graph.status != GraphStatus::GraphCreating {
            info!(graph_id = %graph_id, status = %graph.status, "graph not awaiting summarization, skip");
            return Ok(());
        }

        self.summarize_graph(graph_id).await?;
        self.lifecycle
            .update_status(graph_id, GraphStatus::Created)
            .await?;
        info!(graph_id = %graph_id, "graph created");
        Ok(())
    }

    async fn summarize_graph(&self, graph_id: GraphId) -> Result<()> {
        let archived = self.archive.list(graph_id).await?;
        let mut root = PathNode::default();

        for classes in &archived {
            for descriptor in classes {
                let Some(class) = descriptor.declared_class() else {
                    continue;
                };

                let functions: BTreeMap<String, String> = descriptor
                    .functions
                    .iter()
                    .filter(|f| !f.name.is_empty())
                    .map(|f| (f.name.clone(), f.description().unwrap_or_default()))
                    .collect();

                let outline = json!({
                    "description": class.description().unwrap_or_default(),
                    "Functions": functions,
                })
                .to_string();

                let refined = match self.summary.summarize_class(&outline).await {
                    Ok(description) => description,
                    Err(e) => {
                        warn!(class = %class.full_name(), error = %e, "class summary failed, keeping extracted description");
                        class.description().unwrap_or_else(|| class.name.clone())
                    }
                };

                if let Err(e) = self
                    .indexer
                    .index_class(graph_id, &class.name, &class.path, &refined)
                    .await
                {
                    warn!(class = %class.full_name(), error = %e, "class meta upsert failed");
                }

                insert_class(
                    &mut root,
                    &class.path,
                    &class.name,
                    ClassSummary {
                        description: refined,
                        functions,
                    },
                );
            }
        }

        for (name, node) in &root.packages {
            self.summarize_path(graph_id, node, name.clone(), name.clone())
                .await?;
        }
        Ok(())
    }

    /// Post-order walk: a folder's summary is distilled from the summaries
    /// of its sub-folders and classes.
    fn summarize_path<'a>(
        &'a self,
        graph_id: GraphId,
        node: &'a PathNode,
        full_path: String,
        name: String,
    ) -> BoxFuture<'a, Result<String>> {
        async move {
            let mut outline = format!(
                "This is a folder named {}, below are the sub paths and classes's description:\n",
                full_path
            );
            for (child_name, child) in &node.packages {
                let child_path = format!("{}/{}", full_path, child_name);
                let child_description = self
                    .summarize_path(graph_id, child, child_path.clone(), child_name.clone())
                    .await?;
                outline.push_str(&format!("Sub path {}: {}\n", child_path, child_description));
            }
            for (class_name, class) in &node.classes {
                outline.push_str(&format!(
                    "Sub class {}/{}: {}\n",
                    full_path, class_name, class.description
                ));
            }
            outline.push_str("Please summarize the folder's functionality. And please keep it as simple as possible.\n");

            let description = self.summary.summarize_path(&outline).await?;
            self.graph
                .set_vertex_description(
                    &VertexKey::Path {
                        graph_id,
                        full_path: full_path.clone(),
                    },
                    &description,
                )
                .await?;
            self.indexer
                .index_path(graph_id, &name, &full_path, &description)
                .await?;
            Ok(description)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryDescriptorArchive, MemoryLifecycleStore};
    use async_trait::async_trait;
    use chrono::Utc;
    use codeatlas_core::{ClassDecl, ClassDescriptor, CodeGraph, MemberDecl};
    use codeatlas_graph::MemoryGraphStore;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use uuid::Uuid;

    struct CannedSummaries;

    #[async_trait]
    impl SummaryClient for CannedSummaries {
        async fn summarize_class(&self, _outline: &str) -> Result<String> {
            Ok("refined class description".to_string())
        }
        async fn summarize_path(&self, outline: &str) -> Result<String> {
            let first_line = outline.lines().next().unwrap_or_default().to_string();
            Ok(format!("summary of {}", first_line))
        }
    }

    struct RecordingIndexer {
        paths: Mutex<Vec<String>>,
        classes: Mutex<Vec<String>>,
    }

    impl RecordingIndexer {
        fn new() -> Self {
            Self {
                paths: Mutex::new(Vec::new()),
                classes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DescriptorIndexer for RecordingIndexer {
        async fn index_classes(&self, _: GraphId, _: &[ClassDescriptor]) -> Result<()> {
            Ok(())
        }
        async fn index_functions(&self, _: GraphId, _: &[ClassDescriptor]) -> Result<()> {
            Ok(())
        }
        async fn index_class(&self, _: GraphId, name: &str, path: &str, _: &str) -> Result<()> {
            self.classes.lock().push(format!("{}/{}", path, name));
            Ok(())
        }
        async fn index_path(&self, _: GraphId, _: &str, full_path: &str, _: &str) -> Result<()> {
            self.paths.lock().push(full_path.to_string());
            Ok(())
        }
        async fn delete_graph(&self, _: GraphId) -> Result<()> {
            Ok(())
        }
    }

    fn descriptor(path: &str, name: &str) -> ClassDescriptor {
        let mut description = HashMap::new();
        description.insert("description".to_string(), json!("does things"));
        ClassDescriptor {
            class: Some(ClassDecl {
                path: path.to_string(),
                name: name.to_string(),
                file_extension: Some("java".to_string()),
                properties: vec![description.clone()],
            }),
            functions: vec![MemberDecl {
                name: "run".to_string(),
                properties: vec![description],
            }],
            ..Default::default()
        }
    }

    async fn graph_in(
        lifecycle: &MemoryLifecycleStore,
        status: GraphStatus,
    ) -> GraphId {
        let id = Uuid::new_v4();
        lifecycle
            .save_graph(CodeGraph {
                id,
                origin_url: "https://github.com/acme/widgets".to_string(),
                branch: "main".to_string(),
                sub_folder: None,
                file_filter: None,
                status,
                deleted: false,
                update_time: Utc::now(),
            })
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn summarization_fills_paths_and_finishes_the_graph() {
        let lifecycle = Arc::new(MemoryLifecycleStore::new());
        let archive = Arc::new(MemoryDescriptorArchive::new());
        let graph_store = Arc::new(MemoryGraphStore::new());
        let indexer = Arc::new(RecordingIndexer::new());

        let graph_id = graph_in(&lifecycle, GraphStatus::GraphCreating).await;
        archive
            .save(graph_id, "a.java", &[descriptor("com/acme/billing", "Invoice")])
            .await
            .unwrap();
        archive
            .save(graph_id, "b.java", &[descriptor("com/acme", "Core")])
            .await
            .unwrap();

        let summarizer = Summarizer::new(
            lifecycle.clone(),
            archive,
            graph_store.clone(),
            indexer.clone(),
            Arc::new(CannedSummaries),
        );
        summarizer
            .handle_summarize_message(SummarizeMessage { graph_id })
            .await
            .unwrap();

        // Every path prefix got a description, children before parents.
        let paths = indexer.paths.lock().clone();
        assert_eq!(paths, vec!["com/acme/billing", "com/acme", "com"]);
        assert_eq!(indexer.classes.lock().len(), 2);

        let billing = graph_store
            .vertex(&VertexKey::Path {
                graph_id,
                full_path: "com/acme/billing".to_string(),
            })
            .unwrap();
        assert!(billing.properties.contains_key("description"));

        let row = lifecycle.get_graph(graph_id).await.unwrap().unwrap();
        assert_eq!(row.status, GraphStatus::Created);
    }

    #[tokio::test]
    async fn stale_summarize_message_is_a_no_op() {
        let lifecycle = Arc::new(MemoryLifecycleStore::new());
        let graph_id = graph_in(&lifecycle, GraphStatus::Created).await;

        let summarizer = Summarizer::new(
            lifecycle.clone(),
            Arc::new(MemoryDescriptorArchive::new()),
            Arc::new(MemoryGraphStore::new()),
            Arc::new(RecordingIndexer::new()),
            Arc::new(CannedSummaries),
        );
        summarizer
            .handle_summarize_message(SummarizeMessage { graph_id })
            .await
            .unwrap();

        let row = lifecycle.get_graph(graph_id).await.unwrap().unwrap();
        assert_eq!(row.status, GraphStatus::Created);
    }
}
