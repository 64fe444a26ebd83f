// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP surface of the knowledge worker
//!
//! The binary serves [`router`]: health and the queue drain endpoints. An
//! application that also hosts the assistant chat routes builds its server
//! with [`router_with_chat`], which puts those routes behind the shared
//! rate limiter.

use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, process_queue_handler, queue_status_handler};
use super::middleware::enforce_rate_limit;
use super::AppState;

fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/knowledge/process-queue",
            get(queue_status_handler).post(process_queue_handler),
        )
}

/// Build the service router
pub fn router(state: AppState) -> Router {
    service_routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the service router plus `chat` routes guarded by the rate limiter
///
/// `chat` must contain at least one route.
pub fn router_with_chat(state: AppState, chat: Router<AppState>) -> Router {
    let limited = chat.route_layer(axum::middleware::from_fn_with_state(
        state.limiter.clone(),
        enforce_rate_limit,
    ));

    service_routes()
        .merge(limited)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router until Ctrl-C
pub async fn start_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
