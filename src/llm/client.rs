//! LlmClient trait

use async_trait::async_trait;

use super::error::LlmError;
use super::types::{CompletionRequest, CompletionResponse};

/// A provider-agnostic LLM completion client.
///
/// Implementations make a single attempt; retries, backoff, and deadlines are
/// applied uniformly by the caller through `retry::call_with_retry`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Execute one completion request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Provider name for the run fingerprint ("openai", "dashscope", ...)
    fn provider_name(&self) -> &str;
}
