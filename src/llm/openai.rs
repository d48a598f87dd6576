//! OpenAI-compatible chat completions client
//!
//! Covers every configured provider: OpenAI itself, DashScope's
//! compatible-mode endpoint, and self-hosted gateways.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::client::LlmClient;
use super::error::LlmError;
use super::types::{CompletionRequest, CompletionResponse, Role, TokenUsage};
use crate::config::LlmConfig;

/// OpenAI-compatible chat API client
pub struct OpenAiCompatClient {
    provider: String,
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl OpenAiCompatClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .get_api_key()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            provider: config.provider.clone(),
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    /// Build the request body for the chat completions endpoint
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(model = %self.model, max_tokens = request.max_tokens, "build_request_body: called");
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(serde_json::json!({
                "role": "system",
                "content": request.system_prompt,
            }));
        }
        for msg in &request.messages {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(serde_json::json!({
                "role": role,
                "content": msg.content,
            }));
        }

        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "messages": messages,
        })
    }

    fn parse_response(&self, api_response: ApiResponse) -> Result<CompletionResponse, LlmError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))?;

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request_body(&request);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(Duration::from_secs(30))
                } else {
                    LlmError::Network(e)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(30));
            return Err(LlmError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(LlmError::Network)?;
        debug!(provider = %self.provider, "complete: response parsed");
        self.parse_response(api_response)
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Message;

    fn test_client() -> OpenAiCompatClient {
        OpenAiCompatClient {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.example.com/v1".to_string(),
            http: Client::new(),
            max_tokens: 1024,
        }
    }

    #[test]
    fn test_build_request_body() {
        let client = test_client();
        let request = CompletionRequest {
            system_prompt: "You are a travel assistant.".to_string(),
            messages: vec![Message::user("Beijing 3 days")],
            max_tokens: 512,
        };

        let body = client.build_request_body(&request);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 512);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
    }

    #[test]
    fn test_max_tokens_clamped_to_config() {
        let client = test_client();
        let request = CompletionRequest {
            system_prompt: String::new(),
            messages: vec![Message::user("hi")],
            max_tokens: 99_999,
        };

        let body = client.build_request_body(&request);
        assert_eq!(body["max_tokens"], 1024);
        // No system prompt, only the user message
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_response() {
        let client = test_client();
        let api_response: ApiResponse = serde_json::from_value(serde_json::json!({
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        }))
        .unwrap();

        let parsed = client.parse_response(api_response).unwrap();
        assert_eq!(parsed.content, "hello");
        assert_eq!(parsed.usage.input_tokens, 10);
        assert_eq!(parsed.usage.output_tokens, 5);
    }

    #[test]
    fn test_parse_response_no_choices() {
        let client = test_client();
        let api_response: ApiResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(client.parse_response(api_response).is_err());
    }
}
