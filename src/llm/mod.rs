//! LLM client module for TripAgent
//!
//! Provides LLM completion requests and the provider factory. The pipeline
//! treats the LLM as optional: with no provider configured, every caller
//! falls back to its deterministic strategy (template clarifications, regex
//! intake, curated-only retrieval).

use std::sync::Arc;

use tracing::{debug, warn};

mod client;
mod error;
mod openai;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAiCompatClient;
pub use types::{extract_json_block, CompletionRequest, CompletionResponse, Message, Role, TokenUsage};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config.
///
/// Returns `None` for template mode: provider unset, or the configured key
/// is missing (the pipeline degrades instead of failing).
pub fn create_client(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "" | "template" => {
            debug!("create_client: template mode, no LLM");
            Ok(None)
        }
        "openai" | "dashscope" | "llm_compatible" => match OpenAiCompatClient::from_config(config) {
            Ok(client) => Ok(Some(Arc::new(client))),
            Err(e) => {
                warn!(error = %e, "create_client: provider configured but unusable, degrading to template mode");
                Ok(None)
            }
        },
        other => Err(LlmError::InvalidResponse(format!(
            "Unknown LLM provider: '{}'. Supported: openai, dashscope, llm_compatible",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_provider_is_template_mode() {
        let config = LlmConfig::default();
        let client = create_client(&config).unwrap();
        assert!(client.is_none());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "mystery".to_string(),
            ..Default::default()
        };
        assert!(create_client(&config).is_err());
    }

    #[test]
    fn test_missing_key_degrades_to_template() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            api_key_env: "TRIPAGENT_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..Default::default()
        };
        let client = create_client(&config).unwrap();
        assert!(client.is_none());
    }
}
