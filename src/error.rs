//! Error types for ticket-sentinel.

use std::time::Duration;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors. Always fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required env: {}. Check .env and .env.example.", keys.join(", "))]
    MissingRequired { keys: Vec<String> },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Chat-platform errors (fetch, send, delete, history).
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {id} not found")]
    NotFound { id: String },

    #[error("Failed to fetch {what} for channel {id}: {reason}")]
    FetchFailed {
        id: String,
        what: String,
        reason: String,
    },

    #[error("Failed to send message to channel {id}: {reason}")]
    SendFailed { id: String, reason: String },

    #[error("Failed to delete message {message_id} in channel {id}: {reason}")]
    DeleteFailed {
        id: String,
        message_id: String,
        reason: String,
    },

    #[error("Invalid platform id: {0}")]
    InvalidId(String),

    #[error("Gateway error: {0}")]
    Gateway(String),
}

/// LLM provider errors. Never surfaced to a ticket thread.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// FAQ corpus loading errors.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse FAQ corpus: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Router branch failures, caught at the branch boundary.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Payment alert failed: {0}")]
    PaymentAlert(String),
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
