use crate::client::LlmClient;
use crate::prompt::{extraction_user_message, EXTRACTION_SYSTEM_PROMPT};
use codeatlas_core::{ClassDescriptor, Extraction, ExtractionClient, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// Files never worth a model call: VCS/tooling ignore files and package
/// manifests carry no class structure.
pub fn is_ignorable(relative_path: &str) -> bool {
    let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    file_name.contains("ignore") || file_name == "package.json"
}

/// Model output wrapped in a markdown fence is still usable.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Interpret raw model output. An empty object means "not code"; so does
/// output that is not parseable JSON, since re-asking the model is pointless
/// and must not wedge the file forever.
pub fn parse_extraction(raw: &str) -> Extraction {
    let text = strip_code_fence(raw);
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "model output was not valid JSON, treating as not code");
            return Extraction::NotCode;
        }
    };

    let entries: Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(ref map) if map.is_empty() => return Extraction::NotCode,
        object @ Value::Object(_) => vec![object],
        other => {
            warn!(kind = %json_kind(&other), "unexpected JSON shape from model, treating as not code");
            return Extraction::NotCode;
        }
    };

    let mut classes = Vec::new();
    for entry in entries {
        match serde_json::from_value::<ClassDescriptor>(entry) {
            Ok(descriptor) => classes.push(descriptor),
            Err(e) => warn!(error = %e, "dropping malformed descriptor entry"),
        }
    }

    if classes.iter().all(|c| c.declared_class().is_none()) {
        return Extraction::NotCode;
    }
    Extraction::Classes(classes)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// [`ExtractionClient`] backed by the chat-completion model.
pub struct LlmExtractionClient {
    client: LlmClient,
}

impl LlmExtractionClient {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExtractionClient for LlmExtractionClient {
    async fn extract(
        &self,
        file_listing: &str,
        relative_path: &str,
        content: &str,
    ) -> Result<Extraction> {
        if is_ignorable(relative_path) {
            debug!(relative_path, "skipping non-analyzable file");
            return Ok(Extraction::NotCode);
        }

        let message = extraction_user_message(file_listing, relative_path, content);
        let raw = self.client.complete(EXTRACTION_SYSTEM_PROMPT, &message).await?;
        Ok(parse_extraction(&raw))
    }
}
