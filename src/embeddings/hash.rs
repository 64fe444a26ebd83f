// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic offline embedder for local development and tests

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::{EmbeddingError, EmbeddingGenerator, DEFAULT_EMBEDDING_DIMENSIONS};

const HASH_MODEL: &str = "local-hash";

#[derive(Debug, Clone)]
pub struct HashEmbedderConfig {
    pub dimension: usize,
    pub normalize: bool,
}

impl Default for HashEmbedderConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_EMBEDDING_DIMENSIONS,
            normalize: true,
        }
    }
}

/// Produces pseudo-random vectors seeded by a hash of the input text
///
/// Identical text always yields the identical vector. The vectors carry no
/// semantic meaning.
pub struct HashEmbedder {
    config: HashEmbedderConfig,
}

impl HashEmbedder {
    pub fn new(config: HashEmbedderConfig) -> Self {
        Self { config }
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(HashEmbedderConfig::default())
    }
}

#[async_trait]
impl EmbeddingGenerator for HashEmbedder {
    async fn generate(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();

        let mut embedding = Vec::with_capacity(self.config.dimension);
        for i in 0..self.config.dimension {
            // Linear congruential step, mixed with the position
            seed = (seed.wrapping_mul(1664525).wrapping_add(1013904223)) ^ (i as u64);
            let value = (seed as f64 / u64::MAX as f64) * 2.0 - 1.0;
            embedding.push(value as f32);
        }

        if self.config.normalize {
            let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for value in &mut embedding {
                    *value /= norm;
                }
            }
        }

        Ok(embedding)
    }

    fn model(&self) -> &str {
        HASH_MODEL
    }
}
