use codeatlas_core::{CodeAtlasError, ExtractionConfig, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: usize,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Chat-completion client shared by extraction and summarization. Throttling
/// responses sleep the configured pause and retry; other transient failures
/// back off exponentially up to the retry bound, then propagate.
pub struct LlmClient {
    config: ExtractionConfig,
    client: Client,
}

impl LlmClient {
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("CodeAtlas/0.3")
            .build()
            .map_err(|e| CodeAtlasError::Network(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub async fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_content.to_string(),
                },
            ],
        };

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(500 * 2_u64.pow(attempt as u32));
                tokio::time::sleep(delay).await;
            }

            let mut builder = self
                .client
                .post(format!("{}/chat/completions", self.config.endpoint))
                .json(&request);
            if let Some(key) = &self.config.api_key {
                builder = builder.header("Authorization", format!("Bearer {}", key));
            }

            match builder.send().await {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    warn!(
                        "model endpoint throttled, sleeping {} ms and retrying...",
                        self.config.throttle_pause_ms
                    );
                    tokio::time::sleep(Duration::from_millis(self.config.throttle_pause_ms)).await;
                    last_error = Some(CodeAtlasError::Extraction(
                        "model endpoint throttled".to_string(),
                    ));
                }
                Ok(response) if response.status().is_success() => {
                    let parsed: ChatResponse = response
                        .json()
                        .await
                        .map_err(|e| CodeAtlasError::Extraction(e.to_string()))?;
                    let content = parsed
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .ok_or_else(|| {
                            CodeAtlasError::Extraction("model returned no choices".to_string())
                        })?;
                    info!(chars = content.len(), "model call successful");
                    return Ok(content);
                }
                Ok(response) if response.status().is_server_error() => {
                    warn!(
                        status = %response.status(),
                        "model call failed (attempt {}/{}), retrying...",
                        attempt + 1,
                        self.config.max_retries + 1
                    );
                    last_error = Some(CodeAtlasError::Extraction(format!(
                        "model endpoint returned {}",
                        response.status()
                    )));
                }
                Ok(response) => {
                    // Client-side errors will not improve with retries.
                    return Err(CodeAtlasError::Extraction(format!(
                        "model endpoint rejected request: {}",
                        response.status()
                    )));
                }
                Err(e) => {
                    warn!(error = %e, "model call errored, retrying...");
                    last_error = Some(CodeAtlasError::Network(e.to_string()));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| CodeAtlasError::Extraction("all model attempts failed".to_string())))
    }
}
