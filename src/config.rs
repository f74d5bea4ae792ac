//! Configuration: environment loading, validation, and tuning constants.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmConfig;

/// Automated-answer attempts allowed per thread within one window.
pub const RATE_LIMIT_MAX_REQUESTS: u32 = 5;
/// Rate-limit window length.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60 * 60);
/// Identical bot replies within this window are suppressed.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(2 * 60);
/// How many recent thread messages the dedup guard inspects on a cache miss.
pub const DEDUP_HISTORY_LIMIT: u8 = 10;
/// Bot stays paused this long after the last staff message.
pub const STAFF_PAUSE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Silent ticket creators are nudged after this long.
pub const INACTIVITY_THRESHOLD: Duration = Duration::from_secs(60);
/// How often tracked threads are checked for a due nudge.
pub const INACTIVITY_POLL_INTERVAL: Duration = Duration::from_secs(15);
/// Threads are dropped from inactivity tracking after this long regardless of activity.
pub const INACTIVITY_CEILING: Duration = Duration::from_secs(2 * 60 * 60);

pub const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const DEDUP_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const PAUSE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const INACTIVITY_SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Number of FAQ entries handed to the model as context.
pub const FAQ_TOP_K: usize = 3;
/// Below this relevance score the model is never consulted.
pub const FAQ_MIN_SCORE: f64 = 2.0;

/// Model answers at or above this confidence are posted; below it the ticket escalates.
pub const CONFIDENCE_THRESHOLD: f32 = 0.6;
pub const MODEL_TIMEOUT: Duration = Duration::from_secs(15);
pub const MODEL_TEMPERATURE: f32 = 0.3;
pub const MODEL_MAX_TOKENS: u32 = 500;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_FAQ_PATH: &str = "data/faq.json";

/// Staff control commands (matched case-insensitively after trimming).
pub const PAUSE_COMMAND: &str = "!pause";
pub const RESUME_COMMAND: &str = "!resume";

/// Required keys, in the order they are reported when missing.
const REQUIRED_KEYS: [&str; 4] = [
    "BOT_TOKEN",
    "PAYMENT_CHANNEL_ID",
    "AMAZON_ROLE_ID",
    "TICKET_CHANNEL_ID",
];

/// Process configuration, validated once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Chat-platform bot credential.
    pub bot_token: SecretString,
    /// Channel that receives payment alerts.
    pub payment_channel_id: String,
    /// Role mentioned in payment alerts.
    pub payment_role_id: String,
    /// Parent channel whose threads are support tickets.
    pub ticket_channel_id: String,
    /// Model credential. `None` disables automated answering.
    pub openai_api_key: Option<SecretString>,
    /// Support role. `None` means nobody is treated as staff.
    pub staff_role_id: Option<String>,
    pub model: String,
    pub faq_path: PathBuf,
    /// Extra detector keywords (lowercased).
    pub gift_card_keywords: Vec<String>,
}

impl BotConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let missing: Vec<String> = REQUIRED_KEYS
            .into_iter()
            .filter(|key| get(*key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingRequired { keys: missing });
        }

        let required = |key: &str| get(key).unwrap_or_default();
        let payment_channel_id = snowflake("PAYMENT_CHANNEL_ID", required("PAYMENT_CHANNEL_ID"))?;
        let payment_role_id = snowflake("AMAZON_ROLE_ID", required("AMAZON_ROLE_ID"))?;
        let ticket_channel_id = snowflake("TICKET_CHANNEL_ID", required("TICKET_CHANNEL_ID"))?;
        let staff_role_id = get("STAFF_ROLE_ID")
            .map(|id| snowflake("STAFF_ROLE_ID", id))
            .transpose()?;

        let gift_card_keywords = get("GIFT_CARD_KEYWORDS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            bot_token: SecretString::from(required("BOT_TOKEN")),
            payment_channel_id,
            payment_role_id,
            ticket_channel_id,
            openai_api_key: get("OPENAI_API_KEY").map(SecretString::from),
            staff_role_id,
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            faq_path: get("FAQ_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FAQ_PATH)),
            gift_card_keywords,
        })
    }

    /// Model settings, when a credential is configured.
    pub fn llm_config(&self) -> Option<LlmConfig> {
        self.openai_api_key.as_ref().map(|key| LlmConfig {
            api_key: key.clone(),
            model: self.model.clone(),
        })
    }
}

/// Platform ids are non-zero unsigned integers.
fn snowflake(key: &str, value: String) -> Result<String, ConfigError> {
    match value.parse::<u64>() {
        Ok(id) if id != 0 => Ok(value),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a numeric id, got '{value}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("BOT_TOKEN", "token-abc"),
            ("PAYMENT_CHANNEL_ID", "1001"),
            ("AMAZON_ROLE_ID", "2002"),
            ("TICKET_CHANNEL_ID", "3003"),
        ]
    }

    #[test]
    fn loads_required_with_defaults() {
        let config = BotConfig::from_lookup(lookup(&required())).unwrap();
        assert_eq!(config.bot_token.expose_secret(), "token-abc");
        assert_eq!(config.payment_channel_id, "1001");
        assert_eq!(config.payment_role_id, "2002");
        assert_eq!(config.ticket_channel_id, "3003");
        assert!(config.openai_api_key.is_none());
        assert!(config.staff_role_id.is_none());
        assert!(config.llm_config().is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.faq_path, PathBuf::from(DEFAULT_FAQ_PATH));
        assert!(config.gift_card_keywords.is_empty());
    }

    #[test]
    fn reports_every_missing_key() {
        let err = BotConfig::from_lookup(lookup(&[("BOT_TOKEN", "x")])).unwrap_err();
        match &err {
            ConfigError::MissingRequired { keys } => {
                assert_eq!(
                    keys,
                    &["PAYMENT_CHANNEL_ID", "AMAZON_ROLE_ID", "TICKET_CHANNEL_ID"]
                );
            }
            other => panic!("Expected MissingRequired, got {:?}", other),
        }
        assert!(err.to_string().contains("PAYMENT_CHANNEL_ID, AMAZON_ROLE_ID"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut pairs = required();
        pairs[0] = ("BOT_TOKEN", "   ");
        let err = BotConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { keys } if keys == ["BOT_TOKEN"]));
    }

    #[test]
    fn optional_keys_enable_features() {
        let mut pairs = required();
        pairs.push(("OPENAI_API_KEY", " sk-test "));
        pairs.push(("STAFF_ROLE_ID", "4004"));
        pairs.push(("GIFT_CARD_KEYWORDS", "Gift Card, carte cadeau,,"));
        let config = BotConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.llm_config().unwrap().model, DEFAULT_MODEL);
        assert_eq!(
            config.openai_api_key.as_ref().unwrap().expose_secret(),
            "sk-test"
        );
        assert_eq!(config.staff_role_id.as_deref(), Some("4004"));
        assert_eq!(config.gift_card_keywords, vec!["gift card", "carte cadeau"]);
    }

    #[test]
    fn rejects_non_numeric_ids() {
        let mut pairs = required();
        pairs[1] = ("PAYMENT_CHANNEL_ID", "payments");
        let err = BotConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "PAYMENT_CHANNEL_ID"));

        let mut pairs = required();
        pairs.push(("STAFF_ROLE_ID", "0"));
        assert!(BotConfig::from_lookup(lookup(&pairs)).is_err());
    }
}
