//! Payment alert posted to the payment channel when a ticket mentions a gift card.

use chrono::{DateTime, Utc};

use crate::pipeline::types::InboundMessage;
use crate::safety::redact_preview;

/// Longest excerpt quoted in an alert, in characters, before quoting.
pub const ALERT_EXCERPT_MAX_CHARS: usize = 1500;

/// Discord's per-message character limit. The rendered alert never exceeds it.
pub const MESSAGE_MAX_CHARS: usize = 2000;

/// Link to a thread in the Discord client.
pub fn thread_link(guild_id: Option<&str>, thread_id: &str) -> String {
    format!(
        "https://discord.com/channels/{}/{}",
        guild_id.unwrap_or("@me"),
        thread_id
    )
}

/// Discord timestamp marker, rendered in each reader's timezone.
pub fn timestamp_marker(at: DateTime<Utc>) -> String {
    format!("<t:{}:F>", at.timestamp())
}

/// Everything an alert shows. The excerpt is already redacted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentAlert {
    pub role_id: String,
    pub thread_link: String,
    pub author_tag: String,
    pub timestamp: String,
    pub excerpt: String,
}

impl PaymentAlert {
    /// Build an alert for `message`, redacting and truncating its text.
    pub fn for_message(message: &InboundMessage, role_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            role_id: role_id.to_string(),
            thread_link: thread_link(message.guild_id.as_deref(), &message.channel_id),
            author_tag: message.author.tag.clone(),
            timestamp: timestamp_marker(now),
            excerpt: redact_preview(&message.content, ALERT_EXCERPT_MAX_CHARS),
        }
    }

    /// Render the alert body, cut to [`MESSAGE_MAX_CHARS`].
    ///
    /// Quote prefixes add two characters per excerpt line, so a short-line
    /// excerpt can still overflow after the excerpt cap.
    pub fn render(&self) -> String {
        let quoted = self
            .excerpt
            .lines()
            .map(|line| format!("> {line}"))
            .collect::<Vec<_>>()
            .join("\n");

        let body = format!(
            "🚨 **Amazon gift card detected**\n\
             <@&{role}>\n\
             🧵 Ticket: {link}\n\
             👤 User: {author}\n\
             ⏰ Time: {time}\n\
             💬 Message:\n\
             {quoted}",
            role = self.role_id,
            link = self.thread_link,
            author = self.author_tag,
            time = self.timestamp,
        );
        fit_message(body)
    }
}

/// Cut `text` to the message limit, marking the cut with `...`.
fn fit_message(text: String) -> String {
    if text.chars().count() <= MESSAGE_MAX_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(MESSAGE_MAX_CHARS - 3).collect();
    cut.push_str("...");
    cut
}
