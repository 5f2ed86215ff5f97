mod azure;
mod github;

pub use azure::AzureOpenAIClient;
pub use github::GitHubModelsClient;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A lazy, finite, non-restartable sequence of text fragments produced by
/// one completion call. Dropping the stream stops consumption; there is
/// no explicit cancellation protocol.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

/// Connection settings for a hosted completion service.
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub api_version: String,
    pub temperature: f32,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: String::new(),
            model: "gpt-4o".to_string(),
            api_version: "2024-05-13".to_string(),
            temperature: 0.7,
        }
    }
}

/// Abstraction over hosted completion services.
///
/// Agents never rely on provider-side tool calling; tool orchestration is
/// manual, so this trait only needs plain and streamed completions.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<LLMResponse>;

    async fn generate_with_context(&self, messages: Vec<Message>) -> Result<LLMResponse>;

    /// Token-by-token variant. Providers without native streaming degrade
    /// to a single-chunk stream over `generate_with_context`.
    async fn stream_generate(&self, messages: Vec<Message>) -> Result<TokenStream>;
}

/// Strip markdown code fences an LLM may wrap around a JSON reply.
pub fn strip_json_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

pub(crate) fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Pull the text delta out of one OpenAI-style streaming chunk, if any.
pub(crate) fn extract_stream_delta(chunk: &serde_json::Value) -> Option<String> {
    chunk["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fence_stripping_handles_plain_and_fenced() {
        assert_eq!(strip_json_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_json_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn delta_extraction() {
        let chunk = json!({
            "object": "chat.completion.chunk",
            "choices": [{"delta": {"content": "Hel"}, "index": 0}]
        });
        assert_eq!(extract_stream_delta(&chunk).as_deref(), Some("Hel"));

        let keepalive = json!({"choices": [{"delta": {}, "index": 0}]});
        assert_eq!(extract_stream_delta(&keepalive), None);

        let empty = json!({"choices": [{"delta": {"content": ""}, "index": 0}]});
        assert_eq!(extract_stream_delta(&empty), None);
    }
}
