// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Cloudflare Workers AI embedding client
//!
//! Calls `POST {base}/accounts/{account}/ai/run/{model}` with a bearer
//! token. Server errors and 429s are retried with exponential backoff;
//! transport errors and other statuses are returned immediately.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use super::{EmbeddingError, EmbeddingGenerator};

pub const DEFAULT_EMBEDDING_MODEL: &str = "@cf/baai/bge-base-en-v1.5";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;
/// Texts sent per request by `generate_batch`
pub const BATCH_SIZE: usize = 100;
const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

#[derive(Debug, Clone)]
pub struct WorkersAiConfig {
    pub account_id: Option<String>,
    pub api_token: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry
    pub base_backoff: Duration,
}

impl Default for WorkersAiConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            api_token: None,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            base_backoff: Duration::from_millis(1000),
        }
    }
}

impl WorkersAiConfig {
    pub fn is_configured(&self) -> bool {
        self.account_id.is_some() && self.api_token.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct WorkersAiResponse {
    #[serde(default)]
    result: Option<WorkersAiResult>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<WorkersAiMessage>,
}

#[derive(Debug, Deserialize)]
struct WorkersAiResult {
    #[serde(default)]
    data: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct WorkersAiMessage {
    message: String,
}

pub struct WorkersAiEmbedder {
    config: WorkersAiConfig,
    client: reqwest::Client,
}

impl WorkersAiEmbedder {
    pub fn new(config: WorkersAiConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, account_id: &str) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.config.base_url.trim_end_matches('/'),
            account_id,
            self.config.model
        )
    }

    fn credentials(&self) -> Result<(&str, &str), EmbeddingError> {
        let account_id = self
            .config
            .account_id
            .as_deref()
            .ok_or(EmbeddingError::NotConfigured("CLOUDFLARE_ACCOUNT_ID is not configured"))?;
        let token = self
            .config
            .api_token
            .as_deref()
            .ok_or(EmbeddingError::NotConfigured("CLOUDFLARE_API_TOKEN is not configured"))?;
        Ok((account_id, token))
    }

    /// Run the model on `input` (a string or an array of strings)
    ///
    /// Returns the vectors in `result.data`, in input order.
    async fn run(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let (account_id, token) = self.credentials()?;
        let url = self.endpoint(account_id);
        let response = self.call(&url, token, &json!({ "text": input })).await?;

        if !response.success {
            let message = if response.errors.is_empty() {
                "Unknown API error".to_string()
            } else {
                response
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            return Err(EmbeddingError::Provider(message));
        }

        response
            .result
            .map(|result| result.data)
            .filter(|data| !data.is_empty())
            .ok_or(EmbeddingError::NoEmbedding)
    }

    async fn call(
        &self,
        url: &str,
        token: &str,
        body: &serde_json::Value,
    ) -> Result<WorkersAiResponse, EmbeddingError> {
        let mut attempt = 0u32;
        loop {
            let response = self
                .client
                .post(url)
                .bearer_auth(token)
                .json(body)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response.json().await?);
            }

            let body = response.text().await.unwrap_or_default();
            let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
            if retryable && attempt < self.config.max_retries {
                let backoff = self.config.base_backoff * 2u32.pow(attempt);
                warn!(
                    status = status.as_u16(),
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "embedding request failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
    }
}

/// Copy a batch-level error onto each item of the batch
fn replicate(error: &EmbeddingError) -> EmbeddingError {
    match error {
        EmbeddingError::NotConfigured(msg) => EmbeddingError::NotConfigured(msg),
        EmbeddingError::EmptyText => EmbeddingError::EmptyText,
        EmbeddingError::Api { status, message } => EmbeddingError::Api {
            status: *status,
            message: message.clone(),
        },
        EmbeddingError::Provider(msg) => EmbeddingError::Provider(msg.clone()),
        EmbeddingError::NoEmbedding => EmbeddingError::NoEmbedding,
        EmbeddingError::Http(e) => EmbeddingError::Provider(e.to_string()),
    }
}

#[async_trait]
impl EmbeddingGenerator for WorkersAiEmbedder {
    async fn generate(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.credentials()?;

        let text = text.trim();
        if text.is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        debug!(model = %self.config.model, chars = text.len(), "requesting embedding");
        let data = self.run(json!(text)).await?;
        data.into_iter().next().ok_or(EmbeddingError::NoEmbedding)
    }

    /// Embeds up to [`BATCH_SIZE`] texts per request
    ///
    /// Blank texts are skipped and reported as `EmptyText`. A failed request
    /// fails every text in its batch.
    async fn generate_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>, EmbeddingError>> {
        if let Err(e) = self.credentials() {
            return texts.iter().map(|_| Err(replicate(&e))).collect();
        }

        let mut results: Vec<Result<Vec<f32>, EmbeddingError>> =
            texts.iter().map(|_| Err(EmbeddingError::EmptyText)).collect();

        let pending: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| (i, text.trim()))
            .filter(|(_, text)| !text.is_empty())
            .collect();

        for chunk in pending.chunks(BATCH_SIZE) {
            debug!(model = %self.config.model, texts = chunk.len(), "requesting embedding batch");
            let input: Vec<&str> = chunk.iter().map(|(_, text)| *text).collect();

            match self.run(json!(input)).await {
                Ok(data) => {
                    let mut vectors = data.into_iter();
                    for (index, _) in chunk {
                        results[*index] = vectors.next().ok_or(EmbeddingError::NoEmbedding);
                    }
                }
                Err(e) => {
                    warn!(error = %e, texts = chunk.len(), "embedding batch failed");
                    for (index, _) in chunk {
                        results[*index] = Err(replicate(&e));
                    }
                }
            }
        }

        results
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
