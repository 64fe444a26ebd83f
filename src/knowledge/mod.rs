// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Knowledge store holding scrubbed content alongside its embedding
//!
//! Records are keyed by `(source_type, source_id)`; an upsert for an
//! existing key replaces content, metadata and vector.

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use memory::{InMemoryKnowledgeStore, StoredKnowledge};
pub use postgrest::PostgrestKnowledgeStore;

/// Marketplace record category a knowledge entry was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Equipment,
    User,
    Labour,
    Review,
    Booking,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Equipment => "equipment",
            SourceType::User => "user",
            SourceType::Labour => "labour",
            SourceType::Review => "review",
            SourceType::Booking => "booking",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content row written to the knowledge store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub source_type: SourceType,
    pub source_id: String,
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Similarity search parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Minimum cosine similarity for a match
    pub threshold: f32,
    /// Maximum number of matches returned
    pub limit: usize,
    /// Restrict matches to these source types; all types when `None`
    pub source_types: Option<Vec<SourceType>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            limit: 10,
            source_types: None,
        }
    }
}

impl SearchOptions {
    fn admits(&self, source_type: SourceType) -> bool {
        self.source_types
            .as_ref()
            .map_or(true, |types| types.contains(&source_type))
    }
}

/// A stored entry returned by similarity search, best match first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    pub id: String,
    pub source_type: SourceType,
    pub source_id: String,
    pub content: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub similarity: f32,
}

fn null_as_empty<'de, D>(
    deserializer: D,
) -> Result<serde_json::Map<String, serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let map: Option<serde_json::Map<String, serde_json::Value>> =
        Deserialize::deserialize(deserializer)?;
    Ok(map.unwrap_or_default())
}

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Knowledge store request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Insert or replace the record for the entry's `(source_type, source_id)`
    async fn upsert(&self, entry: &KnowledgeEntry, embedding: &[f32]) -> Result<(), KnowledgeError>;

    /// Remove the record for `(source_type, source_id)`, if any
    async fn delete(&self, source_type: SourceType, source_id: &str) -> Result<(), KnowledgeError>;

    /// Entries whose embedding is at least `options.threshold` similar to
    /// `query_embedding`, most similar first
    async fn search(
        &self,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<KnowledgeMatch>, KnowledgeError>;
}
