//! One-shot nudge for ticket creators who never describe their request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{Sweep, delta};
use crate::config::{INACTIVITY_CEILING, INACTIVITY_THRESHOLD};
use crate::pipeline::types::SupportPlatform;

#[derive(Debug, Clone)]
struct InactivityEntry {
    created_at: DateTime<Utc>,
    owner_id: Option<String>,
    asked: bool,
}

/// A thread that has been silent past the threshold and not yet nudged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNudge {
    pub thread_id: String,
    pub owner_id: Option<String>,
}

impl PendingNudge {
    /// The nudge text, mentioning the owner when known.
    pub fn message(&self) -> String {
        let body = "Hi! Please describe your request in as much detail as you can so we can help you.";
        match &self.owner_id {
            Some(owner) => format!("<@{owner}> {body}"),
            None => body.to_string(),
        }
    }
}

pub struct InactivityTracker {
    entries: RwLock<HashMap<String, InactivityEntry>>,
    threshold: TimeDelta,
    ceiling: TimeDelta,
}

impl InactivityTracker {
    pub fn new(threshold: Duration, ceiling: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            threshold: delta(threshold),
            ceiling: delta(ceiling),
        }
    }

    /// Start tracking a newly opened thread. Re-tracking an existing thread is a no-op.
    pub async fn track(&self, thread_id: &str, owner_id: Option<String>) {
        self.track_at(thread_id, owner_id, Utc::now()).await;
    }

    pub async fn track_at(&self, thread_id: &str, owner_id: Option<String>, now: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        entries
            .entry(thread_id.to_string())
            .or_insert_with(|| InactivityEntry {
                created_at: now,
                owner_id,
                asked: false,
            });
    }

    /// A message was posted in `thread_id`. Stops tracking when it came from
    /// staff, from the owner, or from anyone when the owner is unknown.
    pub async fn record_activity(&self, thread_id: &str, author_id: &str, is_staff: bool) {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get(thread_id) else {
            return;
        };
        let qualifies = is_staff
            || match &entry.owner_id {
                Some(owner) => owner == author_id,
                None => true,
            };
        if qualifies {
            entries.remove(thread_id);
            debug!(thread_id = %thread_id, "Ticket activity seen, inactivity tracking stopped");
        }
    }

    /// Threads due for their one nudge: not yet asked, at least `threshold`
    /// old and no older than the ceiling.
    pub async fn due_for_nudge(&self) -> Vec<PendingNudge> {
        self.due_for_nudge_at(Utc::now()).await
    }

    pub async fn due_for_nudge_at(&self, now: DateTime<Utc>) -> Vec<PendingNudge> {
        let entries = self.entries.read().await;
        let mut due: Vec<PendingNudge> = entries
            .iter()
            .filter(|(_, e)| {
                let age = now - e.created_at;
                !e.asked && age >= self.threshold && age <= self.ceiling
            })
            .map(|(thread_id, e)| PendingNudge {
                thread_id: thread_id.clone(),
                owner_id: e.owner_id.clone(),
            })
            .collect();
        due.sort_by(|a, b| a.thread_id.cmp(&b.thread_id));
        due
    }

    /// Prevent further nudges for `thread_id`.
    pub async fn mark_asked(&self, thread_id: &str) {
        if let Some(entry) = self.entries.write().await.get_mut(thread_id) {
            entry.asked = true;
        }
    }

    pub async fn is_tracked(&self, thread_id: &str) -> bool {
        self.entries.read().await.contains_key(thread_id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InactivityTracker {
    fn default() -> Self {
        Self::new(INACTIVITY_THRESHOLD, INACTIVITY_CEILING)
    }
}

#[async_trait]
impl Sweep for InactivityTracker {
    fn name(&self) -> &'static str {
        "inactivity"
    }

    async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| now - e.created_at <= self.ceiling);
        before - entries.len()
    }
}

/// Send one nudge per due thread.
///
/// Every due thread is marked asked even if the send fails, so a broken
/// channel is not retried every poll.
pub async fn send_due_nudges(tracker: &InactivityTracker, platform: &dyn SupportPlatform) -> usize {
    let due = tracker.due_for_nudge().await;
    let mut sent = 0;
    for nudge in due {
        match platform.send(&nudge.thread_id, &nudge.message()).await {
            Ok(()) => {
                sent += 1;
                info!(thread_id = %nudge.thread_id, "Sent inactivity nudge");
            }
            Err(e) => {
                warn!(
                    platform = platform.name(),
                    thread_id = %nudge.thread_id,
                    error = %e,
                    "Failed to send inactivity nudge"
                );
            }
        }
        tracker.mark_asked(&nudge.thread_id).await;
    }
    sent
}

/// Spawn the background task that nudges silent ticket creators.
pub fn spawn_nudge_task(
    tracker: Arc<InactivityTracker>,
    platform: Arc<dyn SupportPlatform>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            send_due_nudges(&tracker, platform.as_ref()).await;
        }
    })
}
