// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request admission for the assistant chat endpoint

pub mod client;
pub mod rate_limiter;

pub use client::{authenticated_user, client_ip, AuthenticatedUser};
pub use rate_limiter::{
    rate_limit_key, RateLimitConfig, RateLimitDecision, RateLimiter, DEFAULT_MAX_REQUESTS,
    DEFAULT_WINDOW_MS,
};
