//! Per-thread state machines.
//!
//! Each container owns one map keyed by thread id and is shared behind an
//! `Arc`. Expiry is decided lazily at read time; the periodic sweeps spawned
//! here only bound memory, so a sweep racing a read can never change an
//! outcome.

pub mod dedup;
pub mod inactivity;
pub mod pause;
pub mod rate_limit;

pub use dedup::DedupGuard;
pub use inactivity::{InactivityTracker, PendingNudge, send_due_nudges, spawn_nudge_task};
pub use pause::PauseTracker;
pub use rate_limit::RateLimiter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

/// A state container whose stale entries can be dropped.
#[async_trait]
pub trait Sweep: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Remove entries that are stale at `now`. Returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> usize;
}

/// Spawn a background task that sweeps `target` every `interval`.
pub fn spawn_sweeper(target: Arc<dyn Sweep>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = target.sweep(Utc::now()).await;
            if removed > 0 {
                debug!(state = target.name(), removed, "Swept stale entries");
            }
        }
    })
}

/// Convert a configured window into a chrono delta.
pub(crate) fn delta(window: Duration) -> TimeDelta {
    TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX)
}
