// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use agriserve_knowledge::{
    api::{start_server, AppState},
    EmbeddingGenerator, EmbeddingQueue, HashEmbedder, InMemoryKnowledgeStore, KnowledgeStore,
    PostgrestKnowledgeStore, RateLimiter, RegexPiiScrubber, ServiceConfig, WorkersAiEmbedder,
};
use anyhow::{anyhow, Result};
use std::{env, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env();
    config.validate().map_err(|e| anyhow!(e))?;

    if config.cron_secret.is_none() {
        warn!("CRON_SECRET not set; queue drain endpoint will reject every request");
    }

    let store: Arc<dyn KnowledgeStore> = match &config.knowledge_store {
        Some(store_config) => {
            info!(url = %store_config.url, "using PostgREST knowledge store");
            Arc::new(PostgrestKnowledgeStore::new(store_config)?)
        }
        None => {
            warn!("SUPABASE_URL/SUPABASE_SERVICE_ROLE_KEY not set; using in-memory knowledge store");
            Arc::new(InMemoryKnowledgeStore::new())
        }
    };

    // Offline vectors are only acceptable when nothing is persisted
    let embedder: Arc<dyn EmbeddingGenerator> =
        if !config.embedding.is_configured() && config.knowledge_store.is_none() {
            warn!("Cloudflare credentials not set; using deterministic offline embedder");
            Arc::new(HashEmbedder::default())
        } else {
            Arc::new(WorkersAiEmbedder::new(config.embedding.clone())?)
        };
    info!(model = embedder.model(), "embedding generator ready");

    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let queue = Arc::new(EmbeddingQueue::new(
        config.queue.clone(),
        Arc::new(RegexPiiScrubber::new()?),
        embedder,
        store,
    ));

    let sweeper = limiter.clone().spawn_sweeper(config.sweep_interval);
    let drainer = config.drain_interval.map(|every| {
        info!(interval_secs = every.as_secs(), "in-process queue drain enabled");
        queue.clone().spawn_drain_loop(every)
    });

    // Chat routes mount through `router_with_chat`; this binary serves only
    // health and the queue drain.
    let state = AppState::new(limiter, queue, config.cron_secret.clone());
    let result = start_server(config.bind_addr()?, state).await;

    sweeper.abort();
    if let Some(drainer) = drainer {
        drainer.abort();
    }

    result
}
