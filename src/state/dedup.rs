//! Suppresses identical consecutive bot replies in a thread.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{Sweep, delta};
use crate::config::{DEDUP_HISTORY_LIMIT, DEDUP_WINDOW};
use crate::pipeline::types::SupportPlatform;

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@[&!]?\d+>").expect("mention pattern compiles"));

/// Strip user/role mentions and collapse whitespace.
pub fn normalize(content: &str) -> String {
    let without_mentions = MENTION.replace_all(content, "");
    without_mentions
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
struct DedupEntry {
    last_message: String,
    timestamp: DateTime<Utc>,
}

/// Last-reply cache per thread.
///
/// The cache entry is overwritten with every evaluated candidate, sent or
/// not. On a cache miss the thread's recent history is consulted so a reply
/// sent before a restart still counts.
pub struct DedupGuard {
    entries: RwLock<HashMap<String, DedupEntry>>,
    window: TimeDelta,
    history_limit: u8,
}

impl DedupGuard {
    pub fn new(window: Duration, history_limit: u8) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            window: delta(window),
            history_limit,
        }
    }

    /// True when `candidate` repeats the last bot message in `thread_id`
    /// within the window.
    pub async fn should_skip(
        &self,
        thread_id: &str,
        candidate: &str,
        platform: &dyn SupportPlatform,
    ) -> bool {
        self.should_skip_at(thread_id, candidate, platform, Utc::now())
            .await
    }

    pub async fn should_skip_at(
        &self,
        thread_id: &str,
        candidate: &str,
        platform: &dyn SupportPlatform,
        now: DateTime<Utc>,
    ) -> bool {
        let normalized = normalize(candidate);
        if normalized.is_empty() {
            return false;
        }

        if self.cached_duplicate(thread_id, &normalized, now).await {
            debug!(thread_id = %thread_id, "Duplicate reply found in cache");
            return true;
        }

        // Cache miss: check what the bot actually posted last.
        match platform
            .recent_messages(thread_id, self.history_limit)
            .await
        {
            Ok(history) => {
                let last_bot = history
                    .iter()
                    .find(|m| m.author_id == platform.bot_user_id())
                    .filter(|m| now - m.sent_at < self.window);
                if let Some(last) = last_bot {
                    let last_normalized = normalize(&last.content);
                    if last_normalized == normalized {
                        debug!(thread_id = %thread_id, "Duplicate reply found in thread history");
                        self.store(thread_id, last_normalized, now).await;
                        return true;
                    }
                }
            }
            Err(e) => {
                warn!(
                    thread_id = %thread_id,
                    error = %e,
                    "Failed to check recent messages for duplicates, allowing reply"
                );
            }
        }

        self.store(thread_id, normalized, now).await;
        false
    }

    /// Record a message the bot sent.
    pub async fn record(&self, thread_id: &str, text: &str) {
        self.record_at(thread_id, text, Utc::now()).await;
    }

    pub async fn record_at(&self, thread_id: &str, text: &str, now: DateTime<Utc>) {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return;
        }
        self.store(thread_id, normalized, now).await;
    }

    async fn cached_duplicate(&self, thread_id: &str, normalized: &str, now: DateTime<Utc>) -> bool {
        let entries = self.entries.read().await;
        entries.get(thread_id).is_some_and(|entry| {
            now - entry.timestamp < self.window && entry.last_message == normalized
        })
    }

    async fn store(&self, thread_id: &str, last_message: String, now: DateTime<Utc>) {
        self.entries.write().await.insert(
            thread_id.to_string(),
            DedupEntry {
                last_message,
                timestamp: now,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new(DEDUP_WINDOW, DEDUP_HISTORY_LIMIT)
    }
}

#[async_trait]
impl Sweep for DedupGuard {
    fn name(&self) -> &'static str {
        "dedup"
    }

    async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let stale_after = self.window * 2;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| now - entry.timestamp <= stale_after);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::ChannelError;
    use crate::pipeline::types::{ChannelInfo, HistoryMessage, InboundMessage};

    /// Platform stub that only serves channel history.
    struct HistoryOnly {
        history: Mutex<Result<Vec<HistoryMessage>, String>>,
    }

    impl HistoryOnly {
        fn empty() -> Self {
            Self::with(Ok(vec![]))
        }

        fn with(history: Result<Vec<HistoryMessage>, String>) -> Self {
            Self {
                history: Mutex::new(history),
            }
        }
    }

    #[async_trait]
    impl SupportPlatform for HistoryOnly {
        fn name(&self) -> &str {
            "history-only"
        }
        fn bot_user_id(&self) -> &str {
            "bot"
        }
        async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelInfo, ChannelError> {
            Err(ChannelError::NotFound {
                id: channel_id.into(),
            })
        }
        async fn send(&self, _channel_id: &str, _text: &str) -> Result<(), ChannelError> {
            unimplemented!("not used by dedup")
        }
        async fn reply(&self, _message: &InboundMessage, _text: &str) -> Result<(), ChannelError> {
            unimplemented!("not used by dedup")
        }
        async fn delete(&self, _message: &InboundMessage) -> Result<(), ChannelError> {
            unimplemented!("not used by dedup")
        }
        async fn recent_messages(
            &self,
            channel_id: &str,
            _limit: u8,
        ) -> Result<Vec<HistoryMessage>, ChannelError> {
            self.history
                .lock()
                .unwrap()
                .clone()
                .map_err(|reason| ChannelError::FetchFailed {
                    id: channel_id.into(),
                    what: "messages".into(),
                    reason,
                })
        }
    }

    fn bot_message(content: &str, sent_at: DateTime<Utc>) -> HistoryMessage {
        HistoryMessage {
            id: "h-1".into(),
            author_id: "bot".into(),
            content: content.into(),
            sent_at,
        }
    }

    #[test]
    fn normalize_strips_mentions_and_whitespace() {
        assert_eq!(normalize("<@123>Hello"), "Hello");
        assert_eq!(normalize("<@&456>  Hello \n  world "), "Hello world");
        assert_eq!(normalize("<@!789> hi"), "hi");
        assert_eq!(normalize("  "), "");
    }

    #[tokio::test]
    async fn repeat_within_window_is_skipped() {
        let guard = DedupGuard::default();
        let platform = HistoryOnly::empty();
        let t0 = Utc::now();

        assert!(!guard.should_skip_at("t", "Hello", &platform, t0).await);
        guard.record_at("t", "Hello", t0).await;
        assert!(
            guard
                .should_skip_at("t", "Hello", &platform, t0 + TimeDelta::seconds(90))
                .await
        );
    }

    #[tokio::test]
    async fn repeat_after_window_is_allowed() {
        let guard = DedupGuard::default();
        let platform = HistoryOnly::empty();
        let t0 = Utc::now();

        guard.record_at("t", "Hello", t0).await;
        assert!(
            !guard
                .should_skip_at("t", "Hello", &platform, t0 + TimeDelta::minutes(2))
                .await
        );
    }

    #[tokio::test]
    async fn mention_only_difference_is_a_duplicate() {
        let guard = DedupGuard::default();
        let platform = HistoryOnly::empty();
        let t0 = Utc::now();

        guard.record_at("t", "Hello", t0).await;
        assert!(guard.should_skip_at("t", "<@123>Hello", &platform, t0).await);
    }

    #[tokio::test]
    async fn different_text_is_allowed_and_becomes_the_entry() {
        let guard = DedupGuard::default();
        let platform = HistoryOnly::empty();
        let t0 = Utc::now();

        guard.record_at("t", "Hello", t0).await;
        assert!(!guard.should_skip_at("t", "Goodbye", &platform, t0).await);
        // The evaluated candidate is cached even though it was never recorded as sent.
        assert!(guard.should_skip_at("t", "Goodbye", &platform, t0).await);
        assert!(!guard.should_skip_at("t", "Hello", &platform, t0).await);
    }

    #[tokio::test]
    async fn threads_do_not_share_entries() {
        let guard = DedupGuard::default();
        let platform = HistoryOnly::empty();
        let t0 = Utc::now();

        guard.record_at("a", "Hello", t0).await;
        assert!(!guard.should_skip_at("b", "Hello", &platform, t0).await);
    }

    #[tokio::test]
    async fn history_fallback_catches_reply_missing_from_cache() {
        let guard = DedupGuard::default();
        let t0 = Utc::now();
        let platform = HistoryOnly::with(Ok(vec![
            HistoryMessage {
                id: "h-2".into(),
                author_id: "user".into(),
                content: "thanks".into(),
                sent_at: t0,
            },
            bot_message("<@&1> A human support agent will assist you shortly.", t0 - TimeDelta::seconds(30)),
        ]));

        assert!(
            guard
                .should_skip_at(
                    "t",
                    "A human support agent will assist you shortly.",
                    &platform,
                    t0
                )
                .await
        );
        assert_eq!(guard.len().await, 1);
    }

    #[tokio::test]
    async fn history_older_than_window_is_ignored() {
        let guard = DedupGuard::default();
        let t0 = Utc::now();
        let platform = HistoryOnly::with(Ok(vec![bot_message("Hello", t0 - TimeDelta::minutes(10))]));

        assert!(!guard.should_skip_at("t", "Hello", &platform, t0).await);
    }

    #[tokio::test]
    async fn history_failure_fails_open() {
        let guard = DedupGuard::default();
        let platform = HistoryOnly::with(Err("gateway down".into()));
        let t0 = Utc::now();

        assert!(!guard.should_skip_at("t", "Hello", &platform, t0).await);
        // Candidate still lands in the cache.
        assert!(guard.should_skip_at("t", "Hello", &platform, t0).await);
    }

    #[tokio::test]
    async fn empty_candidate_is_never_skipped() {
        let guard = DedupGuard::default();
        let platform = HistoryOnly::empty();
        assert!(!guard.should_skip("t", "   ", &platform).await);
        assert!(guard.is_empty().await);
    }

    #[tokio::test]
    async fn sweep_drops_entries_older_than_twice_the_window() {
        let guard = DedupGuard::default();
        let t0 = Utc::now();
        guard.record_at("old", "a", t0).await;
        guard.record_at("recent", "b", t0 + TimeDelta::minutes(3)).await;

        let removed = guard.sweep(t0 + TimeDelta::minutes(5)).await;
        assert_eq!(removed, 1);
        assert_eq!(guard.len().await, 1);
    }
}
