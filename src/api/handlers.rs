// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Queue drain and health handlers

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use super::{ApiError, AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub queue_size: usize,
    pub tracked_keys: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatusResponse {
    pub status: String,
    pub service: String,
    pub timestamp: String,
}

/// Query parameters of the drain endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessQueueParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessQueueResponse {
    pub processed: usize,
    pub failed: usize,
    pub timestamp: String,
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        queue_size: state.queue.len(),
        tracked_keys: state.limiter.tracked_keys(),
    })
}

/// GET /api/knowledge/process-queue
pub async fn queue_status_handler() -> Json<QueueStatusResponse> {
    Json(QueueStatusResponse {
        status: "ok".to_string(),
        service: "embedding-queue-processor".to_string(),
        timestamp: timestamp(),
    })
}

/// POST /api/knowledge/process-queue[?limit=n]
///
/// Requires `Authorization: Bearer <CRON_SECRET>`. Drains one batch and
/// reports aggregate counts.
pub async fn process_queue_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<ProcessQueueParams>, QueryRejection>,
) -> Result<Json<ProcessQueueResponse>, ApiError> {
    if !is_authorized(&headers, state.cron_secret.as_deref()) {
        warn!("rejected unauthorized queue drain");
        return Err(ApiError::Unauthorized);
    }

    let Query(params) = params.map_err(|rejection| {
        ApiError::InvalidRequest(format!(
            "limit must be a non-negative integer: {}",
            rejection.body_text()
        ))
    })?;
    let limit = params
        .limit
        .unwrap_or(state.queue.config().default_batch_size);

    let summary = state.queue.process(limit).await;
    info!(
        limit,
        processed = summary.processed,
        failed = summary.failed,
        remaining = state.queue.len(),
        "processed embedding queue batch"
    );

    Ok(Json(ProcessQueueResponse {
        processed: summary.processed,
        failed: summary.failed,
        timestamp: timestamp(),
    }))
}

/// True when the request carries `Bearer <secret>` and a secret is configured
pub fn is_authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return false;
    };

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| bool::from(token.as_bytes().ct_eq(secret.as_bytes())))
        .unwrap_or(false)
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
