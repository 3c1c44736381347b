use crate::{CodeAtlasError, Result};
use serde::{Deserialize, Serialize};

/// What to do when a batch makes zero progress while files remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StallPolicy {
    /// Log a warning and stop the re-enqueue loop.
    LogOnly,
    /// Push the scan message to the dead-letter destination for operator
    /// inspection.
    DeadLetter,
}

impl Default for StallPolicy {
    fn default() -> Self {
        StallPolicy::LogOnly
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Upper bound on files advanced per invocation.
    pub batch_size: usize,
    /// Per-graph scan lease lifetime in seconds; must exceed the worst-case
    /// batch duration.
    pub lease_ttl_secs: u64,
    pub stall_policy: StallPolicy,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            batch_size: 15,
            lease_ttl_secs: 300,
            stall_policy: StallPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub visibility_timeout_secs: u64,
    /// Deliveries beyond this land in the dead-letter buffer.
    pub max_receive_count: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: 120,
            max_receive_count: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Pause before retrying a throttled call, in milliseconds.
    pub throttle_pause_ms: u64,
    pub max_retries: usize,
    pub timeout_secs: u64,
    pub max_tokens: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            model: "qwen2.5-coder".to_string(),
            api_key: None,
            throttle_pause_ms: 30_000,
            max_retries: 3,
            timeout_secs: 120,
            max_tokens: 40_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimension: usize,
    pub max_retries: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            model: "embed-multilingual".to_string(),
            api_key: None,
            dimension: 1024,
            max_retries: 3,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Layered settings: defaults, then `codeatlas.toml` if present, then
/// `CODEATLAS_*` environment overrides (`CODEATLAS_SCANNER__BATCH_SIZE=8`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scanner: ScannerConfig,
    pub queue: QueueConfig,
    pub extraction: ExtractionConfig,
    pub embedding: EmbeddingConfig,
    pub server: ServerConfig,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("codeatlas").required(false))
            .add_source(config::Environment::with_prefix("CODEATLAS").separator("__"))
            .build()
            .map_err(|e| CodeAtlasError::Configuration(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CodeAtlasError::Configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert!(settings.scanner.batch_size >= 1);
        assert_eq!(settings.scanner.stall_policy, StallPolicy::LogOnly);
        assert!(settings.queue.max_receive_count > 0);
        assert_eq!(settings.embedding.dimension, 1024);
    }
}
