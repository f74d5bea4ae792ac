//! LLM integration for automated ticket answers.
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` to bridge
//! rig's `CompletionModel` trait to our `LlmProvider` trait.

pub mod provider;
mod rig_adapter;

pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Provider label used in errors and logs.
const PROVIDER: &str = "openai";

/// Model settings for automated answers.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Build the OpenAI-backed answer model.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("client construction: {e}"),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!(provider = PROVIDER, model = %config.model, "Answer model ready");
    Ok(Arc::new(RigAdapter::new(model, &config.model)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_reports_configured_model() {
        // No request is made, so any key constructs.
        let config = LlmConfig {
            api_key: secrecy::SecretString::from("sk-ticket-test"),
            model: "gpt-4o-mini".to_string(),
        };
        let provider = create_provider(&config).expect("client constructs");
        assert_eq!(provider.model_name(), "gpt-4o-mini");
    }
}
