//! Message router: decides the single action taken for each ticket message.
//!
//! Flow, in fixed precedence:
//! 1. Ignore bots, non-ticket channels and empty text
//! 2. Inactivity "activity seen" hook (always)
//! 3. Staff `!pause` / `!resume` commands
//! 4. Other staff messages pause the thread
//! 5. Paused threads get no reply
//! 6. Gift-card detection → payment alert
//! 7. Automated answer: rate limit → answer → dedup → reply
//!
//! Failures in steps 6-7 are caught here and turned into a fallback
//! escalation reply. Nothing propagates to the gateway handler.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::{BotConfig, CONFIDENCE_THRESHOLD};
use crate::error::PipelineError;
use crate::pipeline::alert::PaymentAlert;
use crate::pipeline::answer::{AnswerService, ESCALATION_MESSAGE};
use crate::pipeline::rules::GiftCardDetector;
use crate::pipeline::types::{
    InboundMessage, RouteOutcome, StaffCommand, SupportPlatform, ThreadOpened,
};
use crate::safety::redact_preview;
use crate::state::{DedupGuard, InactivityTracker, PauseTracker, RateLimiter};

/// Channel and role ids the router needs.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub ticket_channel_id: String,
    pub payment_channel_id: String,
    pub payment_role_id: String,
    /// `None` means nobody is staff.
    pub staff_role_id: Option<String>,
}

impl RouterConfig {
    pub fn from_bot_config(config: &BotConfig) -> Self {
        Self {
            ticket_channel_id: config.ticket_channel_id.clone(),
            payment_channel_id: config.payment_channel_id.clone(),
            payment_role_id: config.payment_role_id.clone(),
            staff_role_id: config.staff_role_id.clone(),
        }
    }
}

/// The per-thread state containers, shared with the background sweepers.
#[derive(Clone, Default)]
pub struct RouterState {
    pub rate_limiter: Arc<RateLimiter>,
    pub dedup: Arc<DedupGuard>,
    pub pauses: Arc<PauseTracker>,
    pub inactivity: Arc<InactivityTracker>,
}

pub struct MessageRouter {
    config: RouterConfig,
    platform: Arc<dyn SupportPlatform>,
    detector: GiftCardDetector,
    /// `None` when no model credential is configured.
    answers: Option<AnswerService>,
    state: RouterState,
}

impl MessageRouter {
    pub fn new(
        config: RouterConfig,
        platform: Arc<dyn SupportPlatform>,
        detector: GiftCardDetector,
        answers: Option<AnswerService>,
        state: RouterState,
    ) -> Self {
        Self {
            config,
            platform,
            detector,
            answers,
            state,
        }
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    /// Start inactivity tracking for a new ticket thread. Returns whether the
    /// thread was tracked.
    pub async fn thread_opened(&self, event: &ThreadOpened) -> bool {
        if event.parent_channel_id.as_deref() != Some(self.config.ticket_channel_id.as_str()) {
            return false;
        }
        self.state
            .inactivity
            .track(&event.thread_id, event.owner_id.clone())
            .await;
        info!(
            thread_id = %event.thread_id,
            owner_known = event.owner_id.is_some(),
            "Tracking new ticket thread"
        );
        true
    }

    /// Route one inbound message.
    pub async fn route(&self, message: &InboundMessage) -> RouteOutcome {
        let outcome = self.dispatch(message).await;
        debug!(
            thread_id = %message.channel_id,
            message_id = %message.id,
            outcome = outcome.label(),
            replied = outcome.replied_in_thread(),
            "Message routed"
        );
        outcome
    }

    async fn dispatch(&self, message: &InboundMessage) -> RouteOutcome {
        // Step 1: filters
        if message.author.is_bot {
            return ignored("bot author");
        }
        if !message.is_ticket_thread(&self.config.ticket_channel_id) {
            return ignored("not a ticket thread");
        }
        let is_staff = self.is_staff(message);
        let command = if is_staff {
            StaffCommand::parse(&message.content)
        } else {
            None
        };
        if command.is_none() && message.content.trim().is_empty() {
            return ignored("no text content");
        }

        let thread_id = message.channel_id.as_str();

        // Step 2: activity hook
        self.state
            .inactivity
            .record_activity(thread_id, &message.author.id, is_staff)
            .await;

        // Step 3: staff commands
        if let Some(command) = command {
            return self.apply_command(message, command).await;
        }

        // Step 4: staff activity
        if is_staff {
            self.state.pauses.record_staff_activity(thread_id).await;
            info!(thread_id = %thread_id, "Staff replied, bot paused for this thread");
            return RouteOutcome::StaffActivity;
        }

        // Step 5: pause
        if self.state.pauses.is_paused(thread_id).await {
            info!(thread_id = %thread_id, "Thread paused, not replying");
            return RouteOutcome::Paused;
        }

        // Step 6: payment alert
        if self.detector.detect(&message.content) {
            return match self.send_payment_alert(message).await {
                Ok(outcome) => outcome,
                Err(e) => self.fail(message, e).await,
            };
        }

        // Step 7: automated answer
        let Some(answers) = &self.answers else {
            debug!(thread_id = %thread_id, "Automated answers disabled");
            return RouteOutcome::AnswersDisabled;
        };

        if !self.state.rate_limiter.allow(thread_id).await {
            info!(thread_id = %thread_id, "Rate limit reached, not replying");
            return RouteOutcome::RateLimited;
        }

        match self.answer(message, answers).await {
            Ok(outcome) => outcome,
            Err(e) => self.fail(message, e).await,
        }
    }

    fn is_staff(&self, message: &InboundMessage) -> bool {
        self.config
            .staff_role_id
            .as_deref()
            .is_some_and(|role| message.author.has_role(role))
    }

    async fn apply_command(&self, message: &InboundMessage, command: StaffCommand) -> RouteOutcome {
        let thread_id = message.channel_id.as_str();
        match command {
            StaffCommand::Pause => self.state.pauses.pause(thread_id).await,
            StaffCommand::Resume => {
                self.state.pauses.resume(thread_id).await;
            }
        }
        info!(thread_id = %thread_id, command = ?command, "Applied staff command");

        if let Err(e) = self.platform.send(thread_id, command.acknowledgment()).await {
            warn!(thread_id = %thread_id, error = %e, "Failed to acknowledge staff command");
        }
        if let Err(e) = self.platform.delete(message).await {
            warn!(
                thread_id = %thread_id,
                message_id = %message.id,
                error = %e,
                "Failed to delete staff command"
            );
        }
        RouteOutcome::Command { command }
    }

    async fn send_payment_alert(
        &self,
        message: &InboundMessage,
    ) -> Result<RouteOutcome, PipelineError> {
        let channel = match self
            .platform
            .fetch_channel(&self.config.payment_channel_id)
            .await
        {
            Ok(channel) => channel,
            Err(e) => {
                error!(
                    thread_id = %message.channel_id,
                    message_id = %message.id,
                    payment_channel_id = %self.config.payment_channel_id,
                    error = %e,
                    "Payment channel unavailable, alert not sent"
                );
                return Ok(RouteOutcome::PaymentChannelUnavailable);
            }
        };

        let alert = PaymentAlert::for_message(message, &self.config.payment_role_id, Utc::now());
        self.platform
            .send(&channel.id, &alert.render())
            .await
            .map_err(|e| PipelineError::PaymentAlert(e.to_string()))?;

        info!(
            thread_id = %message.channel_id,
            author = %message.author.tag,
            "Gift card detected, payment alert sent"
        );
        Ok(RouteOutcome::PaymentAlert)
    }

    async fn answer(
        &self,
        message: &InboundMessage,
        answers: &AnswerService,
    ) -> Result<RouteOutcome, PipelineError> {
        let thread_id = message.channel_id.as_str();
        let answer = answers.answer(&message.content).await;

        let confident = answer.confidence >= CONFIDENCE_THRESHOLD;
        let reply = if confident {
            answer.answer
        } else {
            self.escalation_message()
        };

        if self
            .state
            .dedup
            .should_skip(thread_id, &reply, self.platform.as_ref())
            .await
        {
            info!(thread_id = %thread_id, "Duplicate reply suppressed");
            return Ok(RouteOutcome::Deduplicated);
        }

        self.platform.reply(message, &reply).await?;
        self.state.dedup.record(thread_id, &reply).await;

        info!(
            thread_id = %thread_id,
            confidence = answer.confidence,
            source = ?answer.source,
            escalated = !confident,
            "Replied in ticket"
        );
        Ok(if confident {
            RouteOutcome::AutoAnswered {
                confidence: answer.confidence,
            }
        } else {
            RouteOutcome::Escalated {
                confidence: answer.confidence,
            }
        })
    }

    /// Step 13: log the failure and try the fallback escalation.
    async fn fail(&self, message: &InboundMessage, err: PipelineError) -> RouteOutcome {
        let thread_id = message.channel_id.as_str();
        error!(
            thread_id = %thread_id,
            message_id = %message.id,
            platform = self.platform.name(),
            content = %redact_preview(&message.content, 200),
            error = %err,
            "Ticket handling failed, sending fallback escalation"
        );

        let fallback = self.escalation_message();
        if self
            .state
            .dedup
            .should_skip(thread_id, &fallback, self.platform.as_ref())
            .await
        {
            return RouteOutcome::Failed {
                fallback_sent: false,
            };
        }

        match self.platform.reply(message, &fallback).await {
            Ok(()) => {
                self.state.dedup.record(thread_id, &fallback).await;
                RouteOutcome::Failed {
                    fallback_sent: true,
                }
            }
            Err(e) => {
                error!(
                    thread_id = %thread_id,
                    message_id = %message.id,
                    error = %e,
                    "Fallback escalation failed"
                );
                RouteOutcome::Failed {
                    fallback_sent: false,
                }
            }
        }
    }

    /// The escalation reply, mentioning the support role when configured.
    pub fn escalation_message(&self) -> String {
        match &self.config.staff_role_id {
            Some(role) => format!("<@&{role}> {ESCALATION_MESSAGE}"),
            None => ESCALATION_MESSAGE.to_string(),
        }
    }
}

fn ignored(reason: &str) -> RouteOutcome {
    RouteOutcome::Ignored {
        reason: reason.to_string(),
    }
}
