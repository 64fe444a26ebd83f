// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded background queue for knowledge embedding work

pub mod embedding_queue;
pub mod types;

pub use embedding_queue::EmbeddingQueue;
pub use types::{ProcessSummary, QueueConfig, QueueItem, DEFAULT_BATCH_SIZE, DEFAULT_CAPACITY};
