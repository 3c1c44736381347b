use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type GraphId = Uuid;

/// Identifier handed out by a graph backend for a resolved vertex.
pub type VertexId = u64;

/// Lifecycle of one ingestion job. Only forward transitions are legal;
/// `Created` is terminal, deletion is an orthogonal flag on [`CodeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphStatus {
    #[serde(rename = "CODE_DOWNLOADING")]
    Downloading,
    #[serde(rename = "CODE_ANALYSING")]
    Analysing,
    #[serde(rename = "GRAPH_CREATING")]
    GraphCreating,
    #[serde(rename = "GRAPH_CREATED")]
    Created,
}

impl GraphStatus {
    pub fn can_advance_to(self, next: GraphStatus) -> bool {
        matches!(
            (self, next),
            (GraphStatus::Downloading, GraphStatus::Analysing)
                | (GraphStatus::Analysing, GraphStatus::GraphCreating)
                | (GraphStatus::GraphCreating, GraphStatus::Created)
        )
    }
}

impl fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GraphStatus::Downloading => "CODE_DOWNLOADING",
            GraphStatus::Analysing => "CODE_ANALYSING",
            GraphStatus::GraphCreating => "GRAPH_CREATING",
            GraphStatus::Created => "GRAPH_CREATED",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for GraphStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "CODE_DOWNLOADING" => Ok(GraphStatus::Downloading),
            "CODE_ANALYSING" => Ok(GraphStatus::Analysing),
            "GRAPH_CREATING" => Ok(GraphStatus::GraphCreating),
            "GRAPH_CREATED" => Ok(GraphStatus::Created),
            other => Err(format!("unknown graph status: {}", other)),
        }
    }
}

/// One ingestion job for one repository/branch/subfolder selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeGraph {
    pub id: GraphId,
    pub origin_url: String,
    pub branch: String,
    pub sub_folder: Option<String>,
    pub file_filter: Option<String>,
    pub status: GraphStatus,
    pub deleted: bool,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGraphRequest {
    pub origin_url: String,
    pub branch: String,
    #[serde(default)]
    pub sub_folder: Option<String>,
    #[serde(default)]
    pub file_filter: Option<String>,
}

/// Scan status of one source file within a graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphFile {
    pub graph_id: GraphId,
    pub full_path: String,
    pub scanned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanMessage {
    pub graph_id: GraphId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeMessage {
    pub graph_id: GraphId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexKind {
    Path,
    Class,
    Function,
    Enum,
}

impl fmt::Display for VertexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VertexKind::Path => "path",
            VertexKind::Class => "class",
            VertexKind::Function => "function",
            VertexKind::Enum => "enum",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Contains,
    Extends,
    Call,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Extends => "extends",
            EdgeKind::Call => "call",
        };
        write!(f, "{}", s)
    }
}

/// Natural key of a logical vertex. The key, not a generated id, is the unit
/// of identity: a backend must return the same vertex for the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexKey {
    Path {
        graph_id: GraphId,
        full_path: String,
    },
    Class {
        graph_id: GraphId,
        path: String,
        name: String,
    },
    Function {
        graph_id: GraphId,
        class_path: String,
        name: String,
    },
    Enum {
        graph_id: GraphId,
        class_path: String,
        name: String,
    },
}

impl VertexKey {
    pub fn kind(&self) -> VertexKind {
        match self {
            VertexKey::Path { .. } => VertexKind::Path,
            VertexKey::Class { .. } => VertexKind::Class,
            VertexKey::Function { .. } => VertexKind::Function,
            VertexKey::Enum { .. } => VertexKind::Enum,
        }
    }

    pub fn graph_id(&self) -> GraphId {
        match self {
            VertexKey::Path { graph_id, .. }
            | VertexKey::Class { graph_id, .. }
            | VertexKey::Function { graph_id, .. }
            | VertexKey::Enum { graph_id, .. } => *graph_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            VertexKey::Path { full_path, .. } => {
                full_path.rsplit('/').next().unwrap_or(full_path)
            }
            VertexKey::Class { name, .. }
            | VertexKey::Function { name, .. }
            | VertexKey::Enum { name, .. } => name,
        }
    }

    /// Properties implied by the key itself, written on first creation.
    pub fn intrinsic_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("name".to_string(), self.name().to_string());
        match self {
            VertexKey::Path { full_path, .. } => {
                props.insert("full_path".to_string(), full_path.clone());
            }
            VertexKey::Class { path, .. } => {
                props.insert("path".to_string(), path.clone());
            }
            VertexKey::Function { class_path, .. } | VertexKey::Enum { class_path, .. } => {
                props.insert("full_classname".to_string(), class_path.clone());
            }
        }
        props
    }
}

/// Search indexes mirroring summarizable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaIndex {
    Path,
    Class,
    Function,
}

impl MetaIndex {
    pub const ALL: [MetaIndex; 3] = [MetaIndex::Path, MetaIndex::Class, MetaIndex::Function];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetaIndex::Path => "path_meta_data",
            MetaIndex::Class => "class_meta_data",
            MetaIndex::Function => "func_meta_data",
        }
    }
}

impl fmt::Display for MetaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MetaIndex {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "path_meta_data" => Ok(MetaIndex::Path),
            "class_meta_data" => Ok(MetaIndex::Class),
            "func_meta_data" => Ok(MetaIndex::Function),
            other => Err(format!("unknown meta index: {}", other)),
        }
    }
}

/// Document upserted into a meta index, keyed by the entity's natural id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaDocument {
    pub graph_id: GraphId,
    pub name: String,
    pub path: String,
    pub description: String,
    pub embedding: Vec<f32>,
}

/// Ranked match from a nearest-neighbor query. The embedding is not echoed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaMatch {
    pub id: String,
    pub score: f32,
    pub graph_id: GraphId,
    pub name: String,
    pub path: String,
    pub description: String,
}
