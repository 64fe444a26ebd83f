// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod admission;
pub mod api;
pub mod config;
pub mod embeddings;
pub mod knowledge;
pub mod pii;
pub mod queue;

pub use admission::{rate_limit_key, RateLimitConfig, RateLimitDecision, RateLimiter};
pub use api::AppState;
pub use config::ServiceConfig;
pub use embeddings::{EmbeddingError, EmbeddingGenerator, HashEmbedder, WorkersAiEmbedder};
pub use knowledge::{
    InMemoryKnowledgeStore, KnowledgeEntry, KnowledgeError, KnowledgeMatch, KnowledgeStore,
    PostgrestKnowledgeStore, SearchOptions, SourceType,
};
pub use pii::{PiiScrubber, RegexPiiScrubber, ScrubResult};
pub use queue::{EmbeddingQueue, ProcessSummary, QueueConfig};
