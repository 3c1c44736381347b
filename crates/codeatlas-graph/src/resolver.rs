use codeatlas_core::{
    ClassDescriptor, DescriptorIndexer, EdgeKind, GraphId, GraphStore, MemberKind, Result,
    VertexId, VertexKey,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Request-lifetime map from natural key to vertex handle. Saves store round
/// trips while the several edges of one descriptor reference the same vertex;
/// the store-level find-or-create stays authoritative across invocations.
#[derive(Default)]
struct ResolutionCache {
    handles: HashMap<VertexKey, VertexId>,
}

impl ResolutionCache {
    fn get(&self, key: &VertexKey) -> Option<VertexId> {
        self.handles.get(key).copied()
    }
}

/// Converts one file's descriptors into idempotent vertex and edge upserts,
/// then mirrors summarizable entities into the search indexes.
pub struct EntityResolver {
    graph: Arc<dyn GraphStore>,
    indexer: Arc<dyn DescriptorIndexer>,
}

impl EntityResolver {
    pub fn new(graph: Arc<dyn GraphStore>, indexer: Arc<dyn DescriptorIndexer>) -> Self {
        Self { graph, indexer }
    }

    /// Apply every class described by one file. Safe to call repeatedly with
    /// the same input and in any order relative to other files.
    pub async fn apply(&self, graph_id: GraphId, classes: &[ClassDescriptor]) -> Result<()> {
        let mut cache = ResolutionCache::default();

        for descriptor in classes {
            let Some(class) = descriptor.declared_class() else {
                warn!("descriptor without class path/name, skipping");
                continue;
            };
            let full_class_name = class.full_name();
            debug!(class = %full_class_name, "resolving class");

            // Path prefix chain, then the class under its leaf.
            let path_id = self.upsert_path_chain(&mut cache, graph_id, &class.path).await?;

            let mut class_props = class.property_map();
            if let Some(ext) = &class.file_extension {
                class_props.insert("file_extension".to_string(), ext.clone());
            }
            let class_key = VertexKey::Class {
                graph_id,
                path: class.path.clone(),
                name: class.name.clone(),
            };
            let class_id = self.vertex(&mut cache, &class_key, &class_props).await?;
            if let Some(path_id) = path_id {
                self.graph
                    .find_or_create_edge(EdgeKind::Contains, path_id, class_id)
                    .await?;
            }

            if let Some(parent) = class_props.get("extends") {
                self.upsert_parent(&mut cache, graph_id, class_id, parent).await?;
            }

            // Declared members, each contained by the class.
            for member in &descriptor.functions {
                if member.name.is_empty() {
                    continue;
                }
                let key = VertexKey::Function {
                    graph_id,
                    class_path: full_class_name.clone(),
                    name: member.name.clone(),
                };
                let id = self.vertex(&mut cache, &key, &member.property_map()).await?;
                self.graph
                    .find_or_create_edge(EdgeKind::Contains, class_id, id)
                    .await?;
            }
            for member in &descriptor.enums {
                if member.name.is_empty() {
                    continue;
                }
                let key = VertexKey::Enum {
                    graph_id,
                    class_path: full_class_name.clone(),
                    name: member.name.clone(),
                };
                let id = self.vertex(&mut cache, &key, &member.property_map()).await?;
                self.graph
                    .find_or_create_edge(EdgeKind::Contains, class_id, id)
                    .await?;
            }

            self.resolve_inner_dependencies(&cache, graph_id, &full_class_name, descriptor)
                .await?;
            self.resolve_outer_dependencies(&mut cache, graph_id, &full_class_name, descriptor)
                .await?;
        }

        // Search-index mirroring is a side effect, not a graph correctness
        // requirement: log and move on.
        if let Err(e) = self.indexer.index_classes(graph_id, classes).await {
            warn!(error = %e, "class meta indexing failed");
        }
        if let Err(e) = self.indexer.index_functions(graph_id, classes).await {
            warn!(error = %e, "function meta indexing failed");
        }

        Ok(())
    }

    /// Find-or-create every prefix of `full_path` and chain them with
    /// Contains edges. Returns the leaf vertex, or None for an empty path.
    async fn upsert_path_chain(
        &self,
        cache: &mut ResolutionCache,
        graph_id: GraphId,
        full_path: &str,
    ) -> Result<Option<VertexId>> {
        let mut previous: Option<VertexId> = None;
        let mut prefix = String::new();

        for segment in full_path.split('/').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);

            let key = VertexKey::Path {
                graph_id,
                full_path: prefix.clone(),
            };
            let id = self.vertex(cache, &key, &BTreeMap::new()).await?;
            if let Some(parent) = previous {
                self.graph
                    .find_or_create_edge(EdgeKind::Contains, parent, id)
                    .await?;
            }
            previous = Some(id);
        }
        Ok(previous)
    }

    /// `extends` carries a fully-qualified `path/Name` parent identifier. The
    /// parent class may live in a file not yet scanned, so it is created as a
    /// stub to be filled in later.
    async fn upsert_parent(
        &self,
        cache: &mut ResolutionCache,
        graph_id: GraphId,
        class_id: VertexId,
        parent: &str,
    ) -> Result<()> {
        let Some((path, name)) = parent.rsplit_once('/') else {
            warn!(parent, "extends target is not fully qualified, skipping");
            return Ok(());
        };
        let parent_key = VertexKey::Class {
            graph_id,
            path: path.to_string(),
            name: name.to_string(),
        };
        let parent_id = self.vertex(cache, &parent_key, &BTreeMap::new()).await?;
        self.graph
            .find_or_create_edge(EdgeKind::Extends, class_id, parent_id)
            .await
    }

    /// A call within the same class scope resolves against vertices already
    /// known to this invocation; entries naming unknown members are skipped.
    async fn resolve_inner_dependencies(
        &self,
        cache: &ResolutionCache,
        graph_id: GraphId,
        full_class_name: &str,
        descriptor: &ClassDescriptor,
    ) -> Result<()> {
        for call in &descriptor.inner_dependencies {
            let (Some(from), Some(kind), Some(to_name)) =
                (call.from.as_deref(), call.to_type, call.to_name.as_deref())
            else {
                warn!(class = full_class_name, "malformed inner dependency, skipping");
                continue;
            };

            let from_key = VertexKey::Function {
                graph_id,
                class_path: full_class_name.to_string(),
                name: from.to_string(),
            };
            let to_key = member_key(graph_id, full_class_name, kind, to_name);

            match (cache.get(&from_key), cache.get(&to_key)) {
                (Some(from_id), Some(to_id)) => {
                    self.graph
                        .find_or_create_edge(EdgeKind::Call, from_id, to_id)
                        .await?;
                }
                _ => {
                    debug!(
                        class = full_class_name,
                        from, to_name, "inner dependency names undeclared member, skipping"
                    );
                }
            }
        }
        Ok(())
    }

    /// A call into another class: the target's path, class, and member are
    /// created as stubs if that file has not been scanned yet. When it is,
    /// find-or-create converges on the same vertices and fills the
    /// properties in.
    async fn resolve_outer_dependencies(
        &self,
        cache: &mut ResolutionCache,
        graph_id: GraphId,
        full_class_name: &str,
        descriptor: &ClassDescriptor,
    ) -> Result<()> {
        for call in &descriptor.outer_dependencies {
            let (Some(from), Some(target)) = (call.from.as_deref(), call.to.as_ref()) else {
                warn!(class = full_class_name, "malformed outer dependency, skipping");
                continue;
            };
            if !target.is_complete() {
                warn!(class = full_class_name, "incomplete outer dependency target, skipping");
                continue;
            }
            let target_path = target.path.as_deref().unwrap_or_default();
            let target_class = target.class_name.as_deref().unwrap_or_default();
            let target_name = target.name.as_deref().unwrap_or_default();
            let kind = target.kind.unwrap_or(MemberKind::Function);
            let target_class_path = format!("{}/{}", target_path, target_class);

            let path_id = self.upsert_path_chain(cache, graph_id, target_path).await?;
            let class_key = VertexKey::Class {
                graph_id,
                path: target_path.to_string(),
                name: target_class.to_string(),
            };
            let class_id = self.vertex(cache, &class_key, &BTreeMap::new()).await?;
            if let Some(path_id) = path_id {
                self.graph
                    .find_or_create_edge(EdgeKind::Contains, path_id, class_id)
                    .await?;
            }

            let member_key = member_key(graph_id, &target_class_path, kind, target_name);
            let member_id = self.vertex(cache, &member_key, &BTreeMap::new()).await?;
            self.graph
                .find_or_create_edge(EdgeKind::Contains, class_id, member_id)
                .await?;

            let from_key = VertexKey::Function {
                graph_id,
                class_path: full_class_name.to_string(),
                name: from.to_string(),
            };
            match cache.get(&from_key) {
                Some(from_id) => {
                    self.graph
                        .find_or_create_edge(EdgeKind::Call, from_id, member_id)
                        .await?;
                }
                None => {
                    debug!(
                        class = full_class_name,
                        from, "outer dependency from undeclared function, skipping call edge"
                    );
                }
            }
        }
        Ok(())
    }

    /// Find-or-create through the cache. An empty property bag can be served
    /// from the cache alone; property merges always reach the store.
    async fn vertex(
        &self,
        cache: &mut ResolutionCache,
        key: &VertexKey,
        properties: &BTreeMap<String, String>,
    ) -> Result<VertexId> {
        if properties.is_empty() {
            if let Some(id) = cache.get(key) {
                return Ok(id);
            }
        }
        let id = self.graph.find_or_create_vertex(key, properties).await?;
        cache.handles.insert(key.clone(), id);
        Ok(id)
    }
}

fn member_key(
    graph_id: GraphId,
    class_path: &str,
    kind: MemberKind,
    name: &str,
) -> VertexKey {
    match kind {
        MemberKind::Function => VertexKey::Function {
            graph_id,
            class_path: class_path.to_string(),
            name: name.to_string(),
        },
        MemberKind::Enum => VertexKey::Enum {
            graph_id,
            class_path: class_path.to_string(),
            name: name.to_string(),
        },
    }
}
