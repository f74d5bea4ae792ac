//! Staff pause state per thread.
//!
//! A thread is PAUSED while an entry exists and its last staff message is
//! within the timeout. `is_paused` performs the expiry check itself and drops
//! stale entries, so no background timer is needed for correctness.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::{Sweep, delta};
use crate::config::STAFF_PAUSE_TIMEOUT;

#[derive(Debug, Clone, Copy)]
struct PauseEntry {
    paused_at: DateTime<Utc>,
    last_staff_message: DateTime<Utc>,
}

pub struct PauseTracker {
    entries: RwLock<HashMap<String, PauseEntry>>,
    timeout: TimeDelta,
}

impl PauseTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            timeout: delta(timeout),
        }
    }

    /// Staff posted in the thread: pause it, or refresh an existing pause.
    pub async fn record_staff_activity(&self, thread_id: &str) {
        self.record_staff_activity_at(thread_id, Utc::now()).await;
    }

    pub async fn record_staff_activity_at(&self, thread_id: &str, now: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        entries
            .entry(thread_id.to_string())
            .and_modify(|e| e.last_staff_message = now)
            .or_insert(PauseEntry {
                paused_at: now,
                last_staff_message: now,
            });
    }

    /// Explicit pause command. Same transition as staff activity.
    pub async fn pause(&self, thread_id: &str) {
        self.pause_at(thread_id, Utc::now()).await;
    }

    pub async fn pause_at(&self, thread_id: &str, now: DateTime<Utc>) {
        debug!(thread_id = %thread_id, "Pausing bot replies");
        self.record_staff_activity_at(thread_id, now).await;
    }

    /// Explicit resume command. Returns whether the thread was paused.
    pub async fn resume(&self, thread_id: &str) -> bool {
        debug!(thread_id = %thread_id, "Resuming bot replies");
        self.entries.write().await.remove(thread_id).is_some()
    }

    pub async fn is_paused(&self, thread_id: &str) -> bool {
        self.is_paused_at(thread_id, Utc::now()).await
    }

    /// Lazy expiry: a stale entry is removed and reported as not paused.
    pub async fn is_paused_at(&self, thread_id: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(thread_id) {
            None => false,
            Some(entry) if now - entry.last_staff_message > self.timeout => {
                let paused_for = now - entry.paused_at;
                entries.remove(thread_id);
                debug!(
                    thread_id = %thread_id,
                    paused_secs = paused_for.num_seconds(),
                    "Staff pause expired"
                );
                false
            }
            Some(_) => true,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for PauseTracker {
    fn default() -> Self {
        Self::new(STAFF_PAUSE_TIMEOUT)
    }
}

#[async_trait]
impl Sweep for PauseTracker {
    fn name(&self) -> &'static str {
        "pause"
    }

    async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now - entry.last_staff_message <= self.timeout);
        before - entries.len()
    }
}
