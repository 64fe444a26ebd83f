// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caller identity for admission checks
//!
//! The client IP comes from proxy headers. A user id is only trusted when
//! an upstream auth layer has verified the session and inserted
//! [`AuthenticatedUser`] into the request extensions; request headers are
//! never read for it.

use axum::http::{Extensions, HeaderMap};

/// Verified caller identity, inserted by the auth layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Client IP as reported by the fronting proxy
///
/// Uses the first hop of `x-forwarded-for`, falling back to `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let ip = forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    });

    ip.map(str::to_string)
}

/// Verified user id, if the auth layer attached one
pub fn authenticated_user(extensions: &Extensions) -> Option<&str> {
    extensions
        .get::<AuthenticatedUser>()
        .map(|user| user.0.trim())
        .filter(|id| !id.is_empty())
}
