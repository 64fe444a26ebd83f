// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Embedding generation for knowledge-store content

pub mod hash;
pub mod workers_ai;

use async_trait::async_trait;
use thiserror::Error;

pub use hash::{HashEmbedder, HashEmbedderConfig};
pub use workers_ai::{
    WorkersAiConfig, WorkersAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
};

/// Errors that can occur while generating an embedding
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Credentials or endpoint are missing
    #[error("Embedding provider not configured: {0}")]
    NotConfigured(&'static str),

    /// Input was empty or whitespace only
    #[error("Text cannot be empty")]
    EmptyText,

    /// Non-success HTTP status after retries were exhausted
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// Provider answered but reported failure
    #[error("Embedding provider error: {0}")]
    Provider(String),

    /// Provider answered without a vector
    #[error("No embedding returned from API")]
    NoEmbedding,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Turns text into a vector for similarity search
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate an embedding for `text`
    ///
    /// An `Ok` with an empty vector is possible from some providers and is
    /// treated as a failure by callers.
    async fn generate(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate one result per input, in input order
    async fn generate_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>, EmbeddingError>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.generate(text).await);
        }
        results
    }

    /// Model identifier used for logging and bookkeeping
    fn model(&self) -> &str;
}
