// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-key fixed-window rate limiter for the assistant chat endpoint
//!
//! Each key owns a single window that opens on its first request and
//! counts admissions until `window` has elapsed. The next request after
//! that opens a fresh window. Bursts straddling a boundary can therefore
//! see up to twice the limit, which callers rely on.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Window length used by the chat endpoint
pub const DEFAULT_WINDOW_MS: u64 = 60_000;
/// Requests admitted per key per window
pub const DEFAULT_MAX_REQUESTS: u32 = 20;
/// Upper bound on keys held in memory at once
pub const DEFAULT_MAX_TRACKED_KEYS: usize = 10_000;

/// Rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
    pub max_tracked_keys: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(DEFAULT_WINDOW_MS),
            max_requests: DEFAULT_MAX_REQUESTS,
            max_tracked_keys: DEFAULT_MAX_TRACKED_KEYS,
        }
    }
}

/// Outcome of a single admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_start_ms: i64,
}

/// Fixed-window limiter keyed by caller identity
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<LruCache<String, WindowEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_tracked_keys).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            windows: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Create a limiter with a custom window (for testing)
    pub fn with_window(max_requests: u32, window: Duration) -> Self {
        Self::new(RateLimitConfig {
            window,
            max_requests,
            ..RateLimitConfig::default()
        })
    }

    /// Admit or reject one request for `key` at the current wall-clock time
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, now_ms())
    }

    /// Admit or reject one request for `key` at `now_ms` (milliseconds since epoch)
    pub fn check_at(&self, key: &str, now_ms: i64) -> RateLimitDecision {
        let window_ms = self.window_ms();
        let max = self.config.max_requests;
        let mut windows = self.lock();

        if let Some(entry) = windows.get_mut(key) {
            let elapsed = now_ms - entry.window_start_ms;
            if elapsed < window_ms {
                if entry.count >= max {
                    debug!(key, count = entry.count, "rate limit exceeded");
                    return RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        retry_after_ms: (window_ms - elapsed) as u64,
                    };
                }

                entry.count += 1;
                return RateLimitDecision {
                    allowed: true,
                    remaining: max - entry.count,
                    retry_after_ms: 0,
                };
            }
        }

        windows.put(
            key.to_string(),
            WindowEntry {
                count: 1,
                window_start_ms: now_ms,
            },
        );

        RateLimitDecision {
            allowed: true,
            remaining: max.saturating_sub(1),
            retry_after_ms: 0,
        }
    }

    /// Force the window for `key` to be treated as elapsed on the next check
    pub fn expire_key(&self, key: &str) {
        if let Some(entry) = self.lock().peek_mut(key) {
            entry.window_start_ms = 0;
        }
    }

    /// Drop every tracked key
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Remove entries whose window has elapsed, returning how many were dropped
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(now_ms())
    }

    pub fn sweep_expired_at(&self, now_ms: i64) -> usize {
        let window_ms = self.window_ms();
        let mut windows = self.lock();

        let stale: Vec<String> = windows
            .iter()
            .filter(|(_, entry)| now_ms - entry.window_start_ms >= window_ms)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            windows.pop(key);
        }

        stale.len()
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    /// Requests admitted per window
    pub fn limit(&self) -> u32 {
        self.config.max_requests
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Periodically sweep stale keys until the returned handle is aborted
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired();
                if removed > 0 {
                    debug!(removed, remaining = self.tracked_keys(), "swept stale rate-limit keys");
                }
            }
        })
    }

    fn window_ms(&self) -> i64 {
        self.config.window.as_millis() as i64
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, WindowEntry>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

/// Derive the limiter key for a caller: user id when known, otherwise IP
pub fn rate_limit_key(user_id: Option<&str>, ip: Option<&str>) -> String {
    match user_id {
        Some(id) if !id.is_empty() => format!("user:{}", id),
        _ => format!("ip:{}", ip.unwrap_or("unknown")),
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
