//! Per-thread fixed-window limiter for automated-answer attempts.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

use super::{Sweep, delta};
use crate::config::{RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW};

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Bounds automated-answer attempts per thread.
///
/// The first attempt opens a window of `window` length. Attempts inside the
/// window are counted until `max_requests`; further attempts are denied and
/// not counted. Once `now > reset_at` the next attempt opens a fresh window.
pub struct RateLimiter {
    entries: RwLock<HashMap<String, RateLimitEntry>>,
    max_requests: u32,
    window: TimeDelta,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_requests,
            window: delta(window),
        }
    }

    /// Record an attempt for `thread_id`. Returns false when the thread is over its cap.
    pub async fn allow(&self, thread_id: &str) -> bool {
        self.allow_at(thread_id, Utc::now()).await
    }

    pub async fn allow_at(&self, thread_id: &str, now: DateTime<Utc>) -> bool {
        let fresh = RateLimitEntry {
            count: 0,
            reset_at: now + self.window,
        };
        let mut entries = self.entries.write().await;
        let entry = entries.entry(thread_id.to_string()).or_insert(fresh);

        if now > entry.reset_at {
            *entry = fresh;
        }
        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Attempts left in the current window.
    pub async fn remaining(&self, thread_id: &str) -> u32 {
        self.remaining_at(thread_id, Utc::now()).await
    }

    pub async fn remaining_at(&self, thread_id: &str, now: DateTime<Utc>) -> u32 {
        let entries = self.entries.read().await;
        match entries.get(thread_id) {
            Some(entry) if now <= entry.reset_at => self.max_requests.saturating_sub(entry.count),
            _ => self.max_requests,
        }
    }

    /// Number of threads with a window on record (expired or not).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW)
    }
}

#[async_trait]
impl Sweep for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.reset_at);
        before - entries.len()
    }
}
