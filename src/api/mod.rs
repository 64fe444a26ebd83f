// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod handlers;
pub mod http_server;
pub mod middleware;

use std::sync::Arc;

use crate::admission::RateLimiter;
use crate::queue::EmbeddingQueue;

pub use errors::{ApiError, ErrorResponse};
pub use handlers::{HealthResponse, ProcessQueueParams, ProcessQueueResponse, QueueStatusResponse};
pub use http_server::{router, router_with_chat, start_server};
pub use middleware::enforce_rate_limit;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub queue: Arc<EmbeddingQueue>,
    pub cron_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        limiter: Arc<RateLimiter>,
        queue: Arc<EmbeddingQueue>,
        cron_secret: Option<String>,
    ) -> Self {
        Self {
            limiter,
            queue,
            cron_secret: cron_secret.map(Arc::from),
        }
    }
}
