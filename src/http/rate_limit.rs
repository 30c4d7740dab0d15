//! Request throttling for Storage API traffic
//!
//! A [`RateLimiter`] is shared by every clone of a client. Besides the
//! governor token bucket it carries a pause window: when the Storage API
//! answers 429 the whole client backs off, not just the request that was
//! refused.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as Governor};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Token bucket settings, `storage.http.rate_limit` in the app config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new(10, 10)
    }
}

impl RateLimiterConfig {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }

    fn quota(&self) -> Quota {
        let rate = NonZeroU32::new(self.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(self.burst_size).unwrap_or(NonZeroU32::MIN);
        Quota::per_second(rate).allow_burst(burst)
    }
}

/// Shared throttle: token bucket plus server-requested pauses
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Arc<DefaultDirectRateLimiter>,
    paused_until: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Zero rates or bursts are raised to one
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            bucket: Arc::new(Governor::direct(config.quota())),
            paused_until: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait out any pause, then take a token
    pub async fn wait(&self) {
        if let Some(remaining) = self.remaining_pause() {
            debug!(?remaining, "Storage API asked us to slow down, waiting");
            tokio::time::sleep(remaining).await;
        }
        self.bucket.until_ready().await;
    }

    /// Take a token without waiting
    pub fn try_acquire(&self) -> bool {
        self.remaining_pause().is_none() && self.bucket.check().is_ok()
    }

    /// Hold every request for `delay`; an existing longer pause is kept
    pub fn pause_for(&self, delay: Duration) {
        let Some(until) = Instant::now().checked_add(delay) else {
            warn!(?delay, "Ignoring a pause past the clock's range");
            return;
        };
        let mut paused = self.paused_until.lock().unwrap_or_else(PoisonError::into_inner);
        if paused.map_or(true, |current| current < until) {
            *paused = Some(until);
        }
    }

    /// Time left in the current pause
    pub fn remaining_pause(&self) -> Option<Duration> {
        let paused = self.paused_until.lock().unwrap_or_else(PoisonError::into_inner);
        paused
            .map(|until| until.saturating_duration_since(Instant::now()))
            .filter(|left| !left.is_zero())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("paused_for", &self.remaining_pause())
            .finish_non_exhaustive()
    }
}
