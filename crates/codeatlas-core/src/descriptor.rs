//! Structured output of the extraction model for one source file.
//!
//! The wire format uses PascalCase member names and carries properties as an
//! array of single-entry objects; [`flatten_properties`] folds those into an
//! ordered map with array values joined into delimited strings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// One class (plus its members and dependencies) described by the model.
/// A file normally yields exactly one, but a list is accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassDescriptor {
    #[serde(rename = "Class", default)]
    pub class: Option<ClassDecl>,
    #[serde(rename = "Functions", default)]
    pub functions: Vec<MemberDecl>,
    #[serde(rename = "Enums", default)]
    pub enums: Vec<MemberDecl>,
    #[serde(rename = "InnerDependencies", default)]
    pub inner_dependencies: Vec<InnerDependency>,
    #[serde(rename = "OuterDependencies", default)]
    pub outer_dependencies: Vec<OuterDependency>,
}

impl ClassDescriptor {
    /// The declared class, if the entry is well-formed enough to process.
    pub fn declared_class(&self) -> Option<&ClassDecl> {
        self.class
            .as_ref()
            .filter(|c| !c.name.is_empty() && !c.path.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassDecl {
    #[serde(rename = "Path", default)]
    pub path: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "FileExtension", default)]
    pub file_extension: Option<String>,
    #[serde(rename = "Properties", default)]
    pub properties: Vec<HashMap<String, Value>>,
}

impl ClassDecl {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.path, self.name)
    }

    pub fn property_map(&self) -> BTreeMap<String, String> {
        flatten_properties(&self.properties)
    }

    pub fn description(&self) -> Option<String> {
        find_description(&self.properties)
    }
}

/// A function or enum member declared inside a class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberDecl {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Properties", default)]
    pub properties: Vec<HashMap<String, Value>>,
}

impl MemberDecl {
    pub fn property_map(&self) -> BTreeMap<String, String> {
        flatten_properties(&self.properties)
    }

    pub fn description(&self) -> Option<String> {
        find_description(&self.properties)
    }
}

/// The kind of entity a dependency points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    #[serde(rename = "function", alias = "Function")]
    Function,
    #[serde(rename = "enum", alias = "Enum")]
    Enum,
}

/// Call from a function to a member of the same class scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerDependency {
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "ToType", default)]
    pub to_type: Option<MemberKind>,
    #[serde(rename = "ToName", default)]
    pub to_name: Option<String>,
}

/// Call from a function to a member of another, explicitly named class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OuterDependency {
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "To", default)]
    pub to: Option<OuterTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OuterTarget {
    #[serde(rename = "Path", default)]
    pub path: Option<String>,
    #[serde(rename = "ClassName", default)]
    pub class_name: Option<String>,
    #[serde(rename = "Type", default)]
    pub kind: Option<MemberKind>,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
}

impl OuterTarget {
    /// Targets missing any of path, class name, kind, or name are skipped.
    pub fn is_complete(&self) -> bool {
        self.path.as_deref().is_some_and(|s| !s.is_empty())
            && self.class_name.as_deref().is_some_and(|s| !s.is_empty())
            && self.kind.is_some()
            && self.name.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Fold `[{k: v}, ...]` property entries into one ordered map.
/// Array values are joined with `", "`; scalars keep their bare form.
pub fn flatten_properties(properties: &[HashMap<String, Value>]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for entry in properties {
        for (key, value) in entry {
            map.insert(key.clone(), stringify_value(value));
        }
    }
    map
}

fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(stringify_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn find_description(properties: &[HashMap<String, Value>]) -> Option<String> {
    properties
        .iter()
        .find_map(|entry| entry.get("description"))
        .map(stringify_value)
}
