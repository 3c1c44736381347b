use crate::client::LlmClient;
use crate::prompt::{CLASS_SUMMARY_PROMPT, PATH_SUMMARY_PROMPT};
use codeatlas_core::{Result, SummaryClient};
use async_trait::async_trait;

/// [`SummaryClient`] backed by the same chat-completion model as extraction.
pub struct LlmSummaryClient {
    client: LlmClient,
}

impl LlmSummaryClient {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SummaryClient for LlmSummaryClient {
    async fn summarize_class(&self, class_outline: &str) -> Result<String> {
        let summary = self.client.complete(CLASS_SUMMARY_PROMPT, class_outline).await?;
        Ok(summary.trim().to_string())
    }

    async fn summarize_path(&self, path_outline: &str) -> Result<String> {
        let summary = self.client.complete(PATH_SUMMARY_PROMPT, path_outline).await?;
        Ok(summary.trim().to_string())
    }
}
