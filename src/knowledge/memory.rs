// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process-local knowledge store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{KnowledgeEntry, KnowledgeError, KnowledgeMatch, KnowledgeStore, SearchOptions, SourceType};

/// A stored entry together with its vector
#[derive(Debug, Clone, PartialEq)]
pub struct StoredKnowledge {
    pub entry: KnowledgeEntry,
    pub embedding: Vec<f32>,
}

/// Knowledge store backed by a map; contents are lost on restart
#[derive(Default)]
pub struct InMemoryKnowledgeStore {
    records: Mutex<HashMap<(SourceType, String), StoredKnowledge>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_type: SourceType, source_id: &str) -> Option<StoredKnowledge> {
        self.lock()
            .get(&(source_type, source_id.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(SourceType, String), StoredKnowledge>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn upsert(&self, entry: &KnowledgeEntry, embedding: &[f32]) -> Result<(), KnowledgeError> {
        self.lock().insert(
            (entry.source_type, entry.source_id.clone()),
            StoredKnowledge {
                entry: entry.clone(),
                embedding: embedding.to_vec(),
            },
        );
        Ok(())
    }

    async fn delete(&self, source_type: SourceType, source_id: &str) -> Result<(), KnowledgeError> {
        self.lock().remove(&(source_type, source_id.to_string()));
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<KnowledgeMatch>, KnowledgeError> {
        let mut matches: Vec<KnowledgeMatch> = self
            .lock()
            .values()
            .filter(|stored| options.admits(stored.entry.source_type))
            .filter_map(|stored| {
                let similarity = cosine_similarity(query_embedding, &stored.embedding)?;
                (similarity >= options.threshold).then(|| KnowledgeMatch {
                    id: format!("{}:{}", stored.entry.source_type, stored.entry.source_id),
                    source_type: stored.entry.source_type,
                    source_id: stored.entry.source_id.clone(),
                    content: stored.entry.content.clone(),
                    metadata: stored.entry.metadata.clone(),
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        matches.truncate(options.limit);
        Ok(matches)
    }
}

/// Cosine similarity, or `None` when lengths differ or either vector is zero
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}
