// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};

use crate::knowledge::SourceType;

/// Maximum number of items held before new work is dropped
pub const DEFAULT_CAPACITY: usize = 500;
/// Items drained per trigger when no limit is given
pub const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub capacity: usize,
    pub default_batch_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Content waiting to be embedded
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub source_type: SourceType,
    pub source_id: String,
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Aggregate outcome of one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub processed: usize,
    pub failed: usize,
}

impl ProcessSummary {
    pub fn total(&self) -> usize {
        self.processed + self.failed
    }
}
