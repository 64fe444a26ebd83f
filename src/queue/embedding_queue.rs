// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory FIFO of content awaiting embedding
//!
//! Producers call [`EmbeddingQueue::enqueue`] and return immediately. A
//! timer or the cron endpoint calls [`EmbeddingQueue::process`], which takes
//! a batch off the head and handles every item concurrently:
//! scrub PII, embed, upsert. Each item is attempted once. A full queue drops
//! new work and a failed item is discarded; neither is reported to the
//! producer.

use futures::future::join_all;
use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{ProcessSummary, QueueConfig, QueueItem};
use crate::embeddings::{EmbeddingError, EmbeddingGenerator};
use crate::knowledge::{KnowledgeEntry, KnowledgeError, KnowledgeStore, SourceType};
use crate::pii::PiiScrubber;

#[derive(Error, Debug)]
enum ItemFailure {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("embedding was empty")]
    EmptyEmbedding,

    #[error("upsert failed: {0}")]
    Store(#[from] KnowledgeError),
}

pub struct EmbeddingQueue {
    config: QueueConfig,
    items: Mutex<VecDeque<QueueItem>>,
    scrubber: Arc<dyn PiiScrubber>,
    embedder: Arc<dyn EmbeddingGenerator>,
    store: Arc<dyn KnowledgeStore>,
}

impl EmbeddingQueue {
    pub fn new(
        config: QueueConfig,
        scrubber: Arc<dyn PiiScrubber>,
        embedder: Arc<dyn EmbeddingGenerator>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(config.capacity)),
            config,
            scrubber,
            embedder,
            store,
        }
    }

    /// Append content to the tail of the queue
    ///
    /// Silently drops the item when the queue is at capacity.
    pub fn enqueue(
        &self,
        source_type: SourceType,
        source_id: impl Into<String>,
        content: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) {
        let mut items = self.lock();
        if items.len() >= self.config.capacity {
            debug!(%source_type, capacity = self.config.capacity, "embedding queue full, dropping item");
            return;
        }

        items.push_back(QueueItem {
            source_type,
            source_id: source_id.into(),
            content: content.into(),
            metadata,
        });
    }

    /// Drain up to `limit` items from the head and process them concurrently
    ///
    /// Resolves once every drained item has either been stored or failed.
    pub async fn process(&self, limit: usize) -> ProcessSummary {
        let batch: Vec<QueueItem> = {
            let mut items = self.lock();
            let take = limit.min(items.len());
            items.drain(..take).collect()
        };

        if batch.is_empty() {
            return ProcessSummary::default();
        }

        let outcomes = join_all(batch.into_iter().map(|item| self.process_guarded(item))).await;

        let processed = outcomes.iter().filter(|ok| **ok).count();
        ProcessSummary {
            processed,
            failed: outcomes.len() - processed,
        }
    }

    /// Drain one batch of the configured default size
    pub async fn process_default(&self) -> ProcessSummary {
        self.process(self.config.default_batch_size).await
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Drain a default-sized batch on every tick until the handle is aborted
    pub fn spawn_drain_loop(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let summary = self.process_default().await;
                if summary.total() > 0 {
                    info!(
                        processed = summary.processed,
                        failed = summary.failed,
                        remaining = self.len(),
                        "drained embedding queue"
                    );
                }
            }
        })
    }

    async fn process_guarded(&self, item: QueueItem) -> bool {
        let source_type = item.source_type;
        let source_id = item.source_id.clone();

        match AssertUnwindSafe(self.process_item(item)).catch_unwind().await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(%source_type, %source_id, error = %e, "embedding item failed");
                false
            }
            Err(_) => {
                warn!(%source_type, %source_id, "embedding item panicked");
                false
            }
        }
    }

    async fn process_item(&self, item: QueueItem) -> Result<(), ItemFailure> {
        let scrubbed = self.scrubber.scrub(&item.content);
        let embedding = self.embedder.generate(&scrubbed.scrubbed).await?;
        if embedding.is_empty() {
            return Err(ItemFailure::EmptyEmbedding);
        }

        let entry = KnowledgeEntry {
            source_type: item.source_type,
            source_id: item.source_id,
            content: scrubbed.scrubbed,
            metadata: item.metadata,
        };
        self.store.upsert(&entry, &embedding).await?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueueItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
