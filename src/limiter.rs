// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter.
//!
//! Each key owns a [`RateBucket`] counting admissions until the window ends.
//! When a window is over the next request starts a fresh one, so up to twice
//! the limit can pass around a window boundary. Sign-in and form submission
//! traffic tolerates that; in exchange each key costs one counter and one
//! timestamp.
//!
//! The bucket table lives behind [`BucketStore`], and time comes from a
//! [`Clock`], so the admission algorithm is independent of where buckets are
//! kept and of the wall clock.

use crate::clock::{Clock, SystemClock};
use crate::error::{GateError, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Admissions left in the current window
    pub remaining: u32,
    /// When the current window ends
    pub reset_at: DateTime<Utc>,
}

impl RateLimitResult {
    /// Time until the window resets, clamped at zero.
    pub fn retry_after(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.reset_at - now).to_std().unwrap_or_default()
    }
}

/// Counting state for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBucket {
    pub count: u32,
    pub window_end: DateTime<Utc>,
}

impl RateBucket {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.window_end <= now
    }
}

/// Run one admission against `slot`, updating it in place.
fn admit(
    slot: &mut Option<RateBucket>,
    now: DateTime<Utc>,
    limit: u32,
    window: Duration,
) -> RateLimitResult {
    match slot {
        Some(bucket) if !bucket.is_expired(now) => {
            if bucket.count < limit {
                bucket.count += 1;
                RateLimitResult {
                    allowed: true,
                    remaining: limit - bucket.count,
                    reset_at: bucket.window_end,
                }
            } else {
                RateLimitResult {
                    allowed: false,
                    remaining: 0,
                    reset_at: bucket.window_end,
                }
            }
        }
        _ => {
            let bucket = RateBucket {
                count: 1,
                window_end: now
                    .checked_add_signed(window)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            };
            *slot = Some(bucket);
            RateLimitResult {
                allowed: true,
                remaining: limit.saturating_sub(1),
                reset_at: bucket.window_end,
            }
        }
    }
}

/// Storage for the bucket table.
///
/// Implementations must run `update` atomically with respect to every other
/// `update` and `sweep_expired` touching the same key.
pub trait BucketStore: Send + Sync {
    /// Run `f` against the slot for `key`. A slot left `None` is removed.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(&mut Option<RateBucket>) -> RateLimitResult,
    ) -> RateLimitResult;

    /// Drop every bucket whose window ended at or before `now`.
    /// Returns how many were removed.
    fn sweep_expired(&self, now: DateTime<Utc>) -> usize;

    /// Number of buckets currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local bucket table behind a single mutex.
#[derive(Debug, Default)]
pub struct MemoryBucketStore {
    buckets: Mutex<HashMap<String, RateBucket>>,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BucketStore for MemoryBucketStore {
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(&mut Option<RateBucket>) -> RateLimitResult,
    ) -> RateLimitResult {
        let mut buckets = self.buckets.lock();
        let mut slot = buckets.get(key).copied();
        let result = f(&mut slot);
        match slot {
            Some(bucket) => {
                buckets.insert(key.to_string(), bucket);
            }
            None => {
                buckets.remove(key);
            }
        }
        result
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_expired(now));
        before - buckets.len()
    }

    fn len(&self) -> usize {
        self.buckets.lock().len()
    }
}

/// Longest window a rule may use: one year.
pub const MAX_WINDOW_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// A per-endpoint limit. The namespace keeps endpoints from sharing buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRule {
    namespace: String,
    limit: u32,
    window: Duration,
}

impl RateLimitRule {
    /// Build a rule, rejecting a zero limit or a window outside
    /// `1..=MAX_WINDOW_MS` milliseconds.
    pub fn new(namespace: impl Into<String>, limit: u32, window_ms: u64) -> Result<Self> {
        let namespace = namespace.into();
        if limit == 0 {
            return Err(GateError::InvalidRule {
                namespace,
                reason: "limit must be greater than zero",
            });
        }
        let window = i64::try_from(window_ms)
            .ok()
            .filter(|ms| (1..=MAX_WINDOW_MS as i64).contains(ms))
            .and_then(Duration::try_milliseconds)
            .ok_or_else(|| GateError::InvalidRule {
                namespace: namespace.clone(),
                reason: "window must be between 1 ms and one year",
            })?;
        Ok(Self {
            namespace,
            limit,
            window,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Bucket key for a client under this rule.
    pub fn key_for(&self, client: &str) -> String {
        format!("{}:{}", self.namespace, client)
    }
}

/// Thread-safe rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Limiter over an in-memory table and the wall clock.
    pub fn new() -> Self {
        Self::with_parts(Arc::new(MemoryBucketStore::new()), Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_parts(Arc::new(MemoryBucketStore::new()), clock)
    }

    pub fn with_parts(store: Arc<dyn BucketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Count one request against `key`.
    ///
    /// `limit` and `window` must be positive; callers validate them up front
    /// (see [`RateLimitRule::new`]).
    pub fn check_rate_limit(&self, key: &str, limit: u32, window: Duration) -> RateLimitResult {
        debug_assert!(limit > 0, "rate limit must be positive");
        debug_assert!(window > Duration::zero(), "rate window must be positive");

        let now = self.clock.now();
        let result = self
            .store
            .update(key, &mut |slot: &mut Option<RateBucket>| admit(slot, now, limit, window));

        if result.allowed {
            debug!(%key, remaining = result.remaining, "Request admitted");
        } else {
            info!(%key, reset_at = %result.reset_at, "Request rate limited");
        }
        result
    }

    /// Check `client` against a namespaced rule.
    pub fn check(&self, rule: &RateLimitRule, client: &str) -> RateLimitResult {
        self.check_rate_limit(&rule.key_for(client), rule.limit, rule.window)
    }

    /// Remove expired buckets. Returns how many were dropped.
    pub fn cleanup(&self) -> usize {
        let removed = self.store.sweep_expired(self.clock.now());
        if removed > 0 {
            debug!(removed, remaining = self.store.len(), "Swept expired rate limit buckets");
        }
        removed
    }

    /// Number of live buckets.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked_keys", &self.store.len())
            .finish()
    }
}
