// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Admission middleware for chat-style routes
//!
//! Every request is first counted against its client IP. When an auth
//! layer has attached an [`AuthenticatedUser`](crate::admission::AuthenticatedUser),
//! the request is counted against the user key as well and must pass both.
//! Attach with
//! `axum::middleware::from_fn_with_state(limiter, enforce_rate_limit)`.

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::debug;

use super::ApiError;
use crate::admission::{authenticated_user, client_ip, rate_limit_key, RateLimiter};

pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip_key = rate_limit_key(None, client_ip(request.headers()).as_deref());
    let mut decision = limiter.check(&ip_key);
    if !decision.allowed {
        debug!(key = %ip_key, retry_after_ms = decision.retry_after_ms, "request rejected by rate limiter");
        return ApiError::RateLimitExceeded {
            retry_after_ms: decision.retry_after_ms,
        }
        .into_response();
    }

    if let Some(user) = authenticated_user(request.extensions()) {
        let user_key = rate_limit_key(Some(user), None);
        let user_decision = limiter.check(&user_key);
        if !user_decision.allowed {
            debug!(key = %user_key, retry_after_ms = user_decision.retry_after_ms, "request rejected by rate limiter");
            return ApiError::RateLimitExceeded {
                retry_after_ms: user_decision.retry_after_ms,
            }
            .into_response();
        }
        decision.remaining = decision.remaining.min(user_decision.remaining);
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.limit()));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    response
}
