//! LLM request/response types
//!
//! Modeled on OpenAI-compatible chat completions, which is what the
//! configured providers (DashScope, OpenAI, self-hosted gateways) all speak.

use serde::{Deserialize, Serialize};

/// A completion request - everything needed for one LLM call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (rendered from a Handlebars template)
    pub system_prompt: String,

    /// Conversation messages, usually a single user turn
    pub messages: Vec<Message>,

    /// Max tokens for the response
    pub max_tokens: u32,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated text
    pub content: String,

    /// Token usage for cost tracking
    pub usage: TokenUsage,
}

/// Token usage for cost tracking
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Strip markdown code fences around a JSON payload.
///
/// Models frequently wrap structured output in ```json blocks even when told
/// not to.
pub fn extract_json_block(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the optional language tag on the fence line
    let body = match rest.split_once('\n') {
        Some((_lang, body)) => body,
        None => rest,
    };
    body.trim_end_matches('`').trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");

        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }

    #[test]
    fn test_extract_json_block_plain() {
        assert_eq!(extract_json_block("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(extract_json_block("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_block_fenced() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_block(fenced), "{\"a\": 1}");

        let no_lang = "```\n[1, 2]\n```";
        assert_eq!(extract_json_block(no_lang), "[1, 2]");
    }
}
