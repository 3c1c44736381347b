use codeatlas_core::{CodeAtlasError, EmbeddingConfig, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Turns a description into a dense vector for the meta indexes.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible embeddings endpoint with bounded retry and exponential
/// backoff on failure.
pub struct HttpEmbeddingProvider {
    config: EmbeddingConfig,
    client: Client,
}

impl HttpEmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("CodeAtlas/0.3")
            .build()
            .map_err(|e| CodeAtlasError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    async fn call_api(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            input: vec![text.to_string()],
            model: self.config.model.clone(),
        };

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2_u64.pow(attempt as u32));
                tokio::time::sleep(delay).await;
                warn!(
                    "embedding call failed (attempt {}/{}), retrying...",
                    attempt,
                    self.config.max_retries + 1
                );
            }

            let mut builder = self
                .client
                .post(format!("{}/embeddings", self.config.endpoint))
                .json(&request);
            if let Some(key) = &self.config.api_key {
                builder = builder.header("Authorization", format!("Bearer {}", key));
            }

            let response =
                timeout(Duration::from_secs(self.config.timeout_secs), builder.send()).await;

            match response {
                Ok(Ok(response)) if response.status().is_success() => {
                    let parsed: EmbeddingResponse = response
                        .json()
                        .await
                        .map_err(|e| CodeAtlasError::Vector(e.to_string()))?;
                    let embedding = parsed
                        .data
                        .into_iter()
                        .next()
                        .map(|d| d.embedding)
                        .ok_or_else(|| {
                            CodeAtlasError::Vector("embedding response was empty".to_string())
                        })?;
                    info!(dimension = embedding.len(), "embedding call successful");
                    return Ok(embedding);
                }
                Ok(Ok(response)) => {
                    last_error = Some(CodeAtlasError::Vector(format!(
                        "embedding endpoint returned {}",
                        response.status()
                    )));
                }
                Ok(Err(e)) => {
                    last_error = Some(CodeAtlasError::Network(e.to_string()));
                }
                Err(_) => {
                    last_error = Some(CodeAtlasError::Network(
                        "embedding request timed out".to_string(),
                    ));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| CodeAtlasError::Vector("all embedding attempts failed".to_string())))
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.call_api(text).await
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Deterministic offline provider: spreads text bytes over a fixed-size
/// vector and normalizes. Good enough to exercise the index contract without
/// a model endpoint.
pub struct HashedEmbeddingProvider {
    dimension: usize,
}

impl HashedEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashedEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        let mut state: u64 = 0xcbf2_9ce4_8422_2325;
        for (i, byte) in text.bytes().enumerate() {
            state = (state ^ byte as u64).wrapping_mul(0x100_0000_01b3);
            let slot = (state as usize ^ i) % self.dimension;
            vector[slot] += (state % 251) as f32 / 251.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashed_embeddings_are_deterministic_and_normalized() {
        let provider = HashedEmbeddingProvider::new(64);
        let a = provider.embed("the quick brown fox").await.unwrap();
        let b = provider.embed("the quick brown fox").await.unwrap();
        let c = provider.embed("something else entirely").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
