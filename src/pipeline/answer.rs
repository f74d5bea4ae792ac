//! Answer service: FAQ lookup plus a bounded model call.
//!
//! Never fails. Every failure path (weak FAQ match, timeout, provider error,
//! malformed output) resolves to the escalation answer with confidence 0.
//! Whether an answer is good enough to post is the router's decision.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{FAQ_MIN_SCORE, MODEL_MAX_TOKENS, MODEL_TEMPERATURE, MODEL_TIMEOUT};
use crate::error::LlmError;
use crate::knowledge::{KnowledgeBase, format_context};
use crate::llm::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::{Answer, AnswerSource};
use crate::safety::redact;

/// Reply used whenever a human has to take over.
pub const ESCALATION_MESSAGE: &str = "A human support agent will assist you shortly.";

pub struct AnswerService {
    llm: Arc<dyn LlmProvider>,
    knowledge: Arc<KnowledgeBase>,
    timeout: Duration,
}

impl AnswerService {
    pub fn new(llm: Arc<dyn LlmProvider>, knowledge: Arc<KnowledgeBase>) -> Self {
        Self {
            llm,
            knowledge,
            timeout: MODEL_TIMEOUT,
        }
    }

    /// Override the model timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Answer a raw ticket message.
    pub async fn answer(&self, raw_message: &str) -> Answer {
        let query = redact(raw_message);

        let result = self.knowledge.search(&query);
        if result.best_score < FAQ_MIN_SCORE {
            debug!(
                best_score = result.best_score,
                "FAQ relevance below floor, escalating without model call"
            );
            return escalation(AnswerSource::NoKnowledge);
        }

        let context = format_context(&result.entries);
        let raw = match self.complete(&context, &query).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(model = self.llm.model_name(), error = %e, "Model call failed, escalating");
                return escalation(AnswerSource::Fallback);
            }
        };

        match parse_answer(&raw) {
            Some((answer, confidence)) => {
                info!(confidence, best_score = result.best_score, "Model answered");
                Answer {
                    answer,
                    confidence,
                    source: AnswerSource::Model,
                }
            }
            None => {
                let e = LlmError::InvalidResponse {
                    provider: self.llm.model_name().to_string(),
                    reason: "expected a JSON object with a non-empty \"answer\"".to_string(),
                };
                warn!(error = %e, response = %redact(&raw), "Escalating");
                escalation(AnswerSource::Fallback)
            }
        }
    }

    async fn complete(&self, context: &str, query: &str) -> Result<String, LlmError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_user_prompt(context, query)),
        ])
        .with_temperature(MODEL_TEMPERATURE)
        .with_max_tokens(MODEL_MAX_TOKENS);

        match tokio::time::timeout(self.timeout, self.llm.complete(request)).await {
            Ok(response) => Ok(response?.content),
            Err(_) => Err(LlmError::Timeout {
                provider: self.llm.model_name().to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

fn escalation(source: AnswerSource) -> Answer {
    Answer {
        answer: ESCALATION_MESSAGE.to_string(),
        confidence: 0.0,
        source,
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_system_prompt() -> String {
    "You are the official automated support assistant for this Discord server's ticket system.\n\n\
     You help users with:\n\
     1. License key activation issues\n\
     2. Payment-related questions\n\
     3. Access issues after purchase\n\
     4. General usage guidance\n\
     5. Redirecting technical issues to the official software Discord or Telegram\n\
     6. Escalating to a human staff member when necessary\n\n\
     Behavior rules:\n\
     - Be professional, calm and concise. No emojis, no long paragraphs.\n\
     - Never speculate and never invent policies.\n\
     - Never provide troubleshooting beyond basic guidance; technical issues go to the official software team.\n\
     - Never provide internal or sensitive information and never mention that you are an AI model.\n\
     - Do not answer unrelated topics.\n\n\
     Payments:\n\
     - Reassure the user and explain that payment verification may take some time.\n\
     - Staff verify payments manually when needed.\n\
     - Never ask for full gift card codes or any sensitive payment details.\n\n\
     Escalation:\n\
     If the question is unclear, the user is frustrated, the issue is outside activation, payment or basic guidance, \
     or you are not confident, answer exactly: \"A human support agent will assist you shortly.\"\n\n\
     Only answer from the provided knowledge base. If it does not contain enough information, escalate."
        .to_string()
}

fn build_user_prompt(context: &str, query: &str) -> String {
    format!(
        "Knowledge Base:\n{context}\n\n\
         Customer Question: {query}\n\n\
         Return ONLY valid JSON (no markdown, no code fences) with this shape:\n\
         {{\"answer\":\"...\", \"confidence\": 0.0}}\n\n\
         Rules:\n\
         - If the Knowledge Base matches the question: use it and set confidence >= 0.6\n\
         - For urgent issues (waiting times, complaints, delays): escalate with confidence < 0.6\n\
         - confidence: number between 0 and 1\n\
         - If unsure or the Knowledge Base doesn't match: set confidence < 0.6 and answer: \"{ESCALATION_MESSAGE}\"\n\
         - Never ask for full gift card codes\n\
         - If the Knowledge Base contains URLs, include ALL of them verbatim\n\
         - Preserve line breaks using \\n in the JSON string"
    )
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse `{answer, confidence}` from raw model text.
///
/// The trimmed text must be a single JSON object with a non-empty string
/// `answer`. `confidence` may be a number or numeric string; it is clamped
/// to `[0, 1]` and anything unusable becomes 0.
fn parse_answer(raw: &str) -> Option<(String, f32)> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    let object = value.as_object()?;

    let answer = object.get("answer")?.as_str()?.trim();
    if answer.is_empty() {
        return None;
    }

    let confidence = match object.get("confidence") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|c| c.is_finite())
    .map(|c| c.clamp(0.0, 1.0) as f32)
    .unwrap_or(0.0);

    Some((answer.to_string(), confidence))
}
