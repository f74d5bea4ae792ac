//! Shared types for the ticket routing pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{PAUSE_COMMAND, RESUME_COMMAND};
use crate::error::ChannelError;

// ── Inbound events ──────────────────────────────────────────────────

/// A message posted somewhere the bot can see.
///
/// Platform adapters convert their native event into this struct before it
/// reaches the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform message id.
    pub id: String,
    /// Channel the message was posted in (the thread id for ticket threads).
    pub channel_id: String,
    /// Parent channel when `channel_id` is a thread, `None` otherwise.
    pub parent_channel_id: Option<String>,
    /// Server the message belongs to, if any.
    pub guild_id: Option<String>,
    pub author: MessageAuthor,
    /// Raw message text. Never log this without redacting it.
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// True when posted in a thread under `ticket_channel_id`.
    pub fn is_ticket_thread(&self, ticket_channel_id: &str) -> bool {
        self.parent_channel_id.as_deref() == Some(ticket_channel_id)
    }
}

/// Who wrote an inbound message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub id: String,
    /// Display tag (e.g. `name` or `name#1234`).
    pub tag: String,
    pub is_bot: bool,
    /// Role ids the author holds in the server.
    pub role_ids: Vec<String>,
}

impl MessageAuthor {
    pub fn has_role(&self, role_id: &str) -> bool {
        self.role_ids.iter().any(|r| r == role_id)
    }
}

/// A new ticket thread was opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadOpened {
    pub thread_id: String,
    pub parent_channel_id: Option<String>,
    /// Creator, when the platform reports one.
    pub owner_id: Option<String>,
}

/// A message from a channel's recent history.
#[derive(Debug, Clone)]
pub struct HistoryMessage {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

/// A resolved outbound channel.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: String,
    pub name: Option<String>,
}

// ── Staff commands ──────────────────────────────────────────────────

/// Explicit staff control of the bot in one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffCommand {
    Pause,
    Resume,
}

impl StaffCommand {
    /// Parse an exact command (surrounding whitespace and case ignored).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case(PAUSE_COMMAND) {
            Some(Self::Pause)
        } else if text.eq_ignore_ascii_case(RESUME_COMMAND) {
            Some(Self::Resume)
        } else {
            None
        }
    }

    /// Acknowledgment posted in the thread.
    pub fn acknowledgment(self) -> &'static str {
        match self {
            Self::Pause => "Bot replies paused for this ticket.",
            Self::Resume => "Bot replies resumed for this ticket.",
        }
    }
}

// ── Answers ─────────────────────────────────────────────────────────

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Parsed from a model response.
    Model,
    /// FAQ relevance below the floor; the model was not consulted.
    NoKnowledge,
    /// The model call or its output failed.
    Fallback,
}

/// Answer Service result. `confidence` is always within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub confidence: f32,
    pub source: AnswerSource,
}

// ── Routing outcome ─────────────────────────────────────────────────

/// The single action the router took for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    /// Not a message the bot acts on.
    Ignored { reason: String },
    /// A staff pause/resume command was applied.
    Command { command: StaffCommand },
    /// A staff message paused the thread.
    StaffActivity,
    /// The thread is paused; nothing sent.
    Paused,
    /// Payment alert posted to the payment channel.
    PaymentAlert,
    /// Payment channel could not be fetched; nothing sent.
    PaymentChannelUnavailable,
    /// No model credential configured.
    AnswersDisabled,
    RateLimited,
    /// The candidate reply duplicated the last bot message.
    Deduplicated,
    /// A model answer was posted.
    AutoAnswered { confidence: f32 },
    /// The escalation message was posted.
    Escalated { confidence: f32 },
    /// A branch failed; the fallback escalation was attempted.
    Failed { fallback_sent: bool },
}

impl RouteOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored { .. } => "ignored",
            Self::Command { .. } => "command",
            Self::StaffActivity => "staff_activity",
            Self::Paused => "paused",
            Self::PaymentAlert => "payment_alert",
            Self::PaymentChannelUnavailable => "payment_channel_unavailable",
            Self::AnswersDisabled => "answers_disabled",
            Self::RateLimited => "rate_limited",
            Self::Deduplicated => "deduplicated",
            Self::AutoAnswered { .. } => "auto_answered",
            Self::Escalated { .. } => "escalated",
            Self::Failed { .. } => "failed",
        }
    }

    /// Whether something was posted into the ticket thread.
    pub fn replied_in_thread(&self) -> bool {
        matches!(
            self,
            Self::Command { .. }
                | Self::AutoAnswered { .. }
                | Self::Escalated { .. }
                | Self::Failed {
                    fallback_sent: true
                }
        )
    }
}

// ── Platform trait ──────────────────────────────────────────────────

/// The chat platform, seen from the router: pure I/O, no business logic.
///
/// Every call is best-effort. Callers log failures and degrade; nothing here
/// is allowed to take down the event flow.
#[async_trait]
pub trait SupportPlatform: Send + Sync {
    /// Platform name (e.g. "discord").
    fn name(&self) -> &str;

    /// User id the bot posts as.
    fn bot_user_id(&self) -> &str;

    /// Resolve a channel by id.
    async fn fetch_channel(&self, channel_id: &str) -> Result<ChannelInfo, ChannelError>;

    /// Post `text` into a channel or thread.
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), ChannelError>;

    /// Post `text` as a reply to `message`.
    async fn reply(&self, message: &InboundMessage, text: &str) -> Result<(), ChannelError>;

    /// Delete `message`.
    async fn delete(&self, message: &InboundMessage) -> Result<(), ChannelError>;

    /// Up to `limit` most recent messages in a channel, newest first.
    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: u8,
    ) -> Result<Vec<HistoryMessage>, ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(parent: Option<&str>) -> InboundMessage {
        InboundMessage {
            id: "m-1".into(),
            channel_id: "thread-1".into(),
            parent_channel_id: parent.map(String::from),
            guild_id: Some("guild-1".into()),
            author: MessageAuthor {
                id: "u-1".into(),
                tag: "alice".into(),
                is_bot: false,
                role_ids: vec!["role-a".into()],
            },
            content: "hello".into(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn ticket_thread_requires_matching_parent() {
        assert!(message(Some("tickets")).is_ticket_thread("tickets"));
        assert!(!message(Some("general")).is_ticket_thread("tickets"));
        assert!(!message(None).is_ticket_thread("tickets"));
    }

    #[test]
    fn author_role_lookup() {
        let msg = message(None);
        assert!(msg.author.has_role("role-a"));
        assert!(!msg.author.has_role("role-b"));
    }

    #[test]
    fn staff_command_parsing() {
        assert_eq!(StaffCommand::parse("!pause"), Some(StaffCommand::Pause));
        assert_eq!(StaffCommand::parse("  !PAUSE \n"), Some(StaffCommand::Pause));
        assert_eq!(StaffCommand::parse("!Resume"), Some(StaffCommand::Resume));
        assert_eq!(StaffCommand::parse("!pause now"), None);
        assert_eq!(StaffCommand::parse("pause"), None);
        assert_eq!(StaffCommand::parse(""), None);
    }

    #[test]
    fn outcome_labels_and_reply_flag() {
        assert_eq!(RouteOutcome::Paused.label(), "paused");
        assert_eq!(
            RouteOutcome::AutoAnswered { confidence: 0.9 }.label(),
            "auto_answered"
        );
        assert!(RouteOutcome::Escalated { confidence: 0.0 }.replied_in_thread());
        assert!(!RouteOutcome::PaymentAlert.replied_in_thread());
        assert!(!RouteOutcome::Failed { fallback_sent: false }.replied_in_thread());
    }

    #[test]
    fn outcome_serialization() {
        let json = serde_json::to_value(RouteOutcome::Command {
            command: StaffCommand::Pause,
        })
        .unwrap();
        assert_eq!(json["outcome"], "command");
        assert_eq!(json["command"], "pause");
    }
}
