// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration loaded from the environment

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::admission::RateLimitConfig;
use crate::embeddings::WorkersAiConfig;
use crate::queue::QueueConfig;

/// Top-level configuration for the knowledge worker binary
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Host the HTTP server binds to
    pub host: String,
    /// Port the HTTP server binds to
    pub port: u16,
    /// Bearer secret required by the queue drain endpoint
    pub cron_secret: Option<String>,
    /// Chat admission limits
    pub rate_limit: RateLimitConfig,
    /// Embedding queue limits
    pub queue: QueueConfig,
    /// Workers AI embedding credentials and model
    pub embedding: WorkersAiConfig,
    /// PostgREST knowledge store; in-memory store is used when unset
    pub knowledge_store: Option<KnowledgeStoreConfig>,
    /// Period of the in-process drain timer; cron-only when unset
    pub drain_interval: Option<Duration>,
    /// Period of the stale rate-limit key sweep
    pub sweep_interval: Duration,
}

/// Connection settings for the Supabase/PostgREST knowledge table
#[derive(Debug, Clone)]
pub struct KnowledgeStoreConfig {
    pub url: String,
    pub service_key: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let knowledge_store = match (
            non_empty_var("SUPABASE_URL"),
            non_empty_var("SUPABASE_SERVICE_ROLE_KEY"),
        ) {
            (Some(url), Some(service_key)) => Some(KnowledgeStoreConfig { url, service_key }),
            _ => None,
        };

        Self {
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            cron_secret: non_empty_var("CRON_SECRET"),
            rate_limit: RateLimitConfig::default(),
            queue: QueueConfig::default(),
            embedding: WorkersAiConfig {
                account_id: non_empty_var("CLOUDFLARE_ACCOUNT_ID"),
                api_token: non_empty_var("CLOUDFLARE_API_TOKEN"),
                model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| WorkersAiConfig::default().model),
                ..WorkersAiConfig::default()
            },
            knowledge_store,
            drain_interval: env::var("EMBEDDING_DRAIN_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            sweep_interval: Duration::from_secs(
                env::var("RATE_LIMIT_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_limit.window.is_zero() {
            return Err("Rate limit window must be greater than 0".to_string());
        }
        if self.rate_limit.max_requests == 0 {
            return Err("Rate limit maximum must be greater than 0".to_string());
        }
        if self.queue.capacity == 0 {
            return Err("Queue capacity must be greater than 0".to_string());
        }
        if self.sweep_interval.is_zero() {
            return Err("Sweep interval must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Socket address for the HTTP listener
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cron_secret: None,
            rate_limit: RateLimitConfig::default(),
            queue: QueueConfig::default(),
            embedding: WorkersAiConfig::default(),
            knowledge_store: None,
            drain_interval: None,
            sweep_interval: Duration::from_secs(300),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
