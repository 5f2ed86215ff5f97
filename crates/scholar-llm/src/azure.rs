use crate::{
    extract_stream_delta, role_str, LLMConfig, LLMProvider, LLMResponse, Message, TokenStream,
    Usage,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::json;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

/// Client for an Azure OpenAI chat-completions deployment.
pub struct AzureOpenAIClient {
    api_key: String,
    endpoint: String,
    model: String,
    api_version: String,
    temperature: f32,
    client: reqwest::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl AzureOpenAIClient {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            anyhow::bail!("Azure OpenAI API key is required");
        }
        if config.endpoint.is_empty() {
            anyhow::bail!("Azure OpenAI endpoint is required");
        }

        Ok(Self {
            api_key: config.api_key,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model,
            api_version: config.api_version,
            temperature: config.temperature,
            client: reqwest::Client::new(),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        })
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SCHOLAR_LLM_API_KEY")
            .context("SCHOLAR_LLM_API_KEY environment variable not set")?;
        let endpoint = std::env::var("SCHOLAR_LLM_ENDPOINT")
            .context("SCHOLAR_LLM_ENDPOINT environment variable not set")?;

        Self::new(LLMConfig {
            api_key,
            endpoint,
            ..Default::default()
        })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.model, self.api_version
        )
    }

    fn request_body(&self, messages: &[Message], stream: bool) -> serde_json::Value {
        let wire_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": role_str(msg.role),
                    "content": msg.content,
                })
            })
            .collect();

        json!({
            "messages": wire_messages,
            "temperature": self.temperature,
            "max_tokens": 4096,
            "stream": stream,
        })
    }

    fn generate_jitter(&self) -> Duration {
        // Time-derived pseudo-random jitter; Send-safe, no RNG crate needed.
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let seed = now.as_nanos() as u64 % 1000; // 0-999 ms
        Duration::from_millis(seed)
    }

    async fn call_api(&self, messages: &[Message]) -> Result<serde_json::Value> {
        let url = self.completions_url();
        let request_body = self.request_body(messages, false);

        debug!("Calling Azure OpenAI deployment: {}", self.model);

        let mut attempt = 0;

        while attempt <= self.max_retries {
            let start_time = Instant::now();
            let jitter = self.generate_jitter();

            match self.perform_api_call(&url, &request_body).await {
                Ok(response_json) => {
                    info!(
                        "Azure OpenAI call successful on attempt {} (took {:?})",
                        attempt + 1,
                        start_time.elapsed()
                    );
                    return Ok(response_json);
                }
                Err(e) => {
                    attempt += 1;
                    warn!("Azure OpenAI call failed on attempt {}: {}", attempt, e);

                    if attempt > self.max_retries {
                        error!("All {} retry attempts failed for Azure OpenAI", self.max_retries);
                        return Err(e);
                    }

                    // Exponential backoff: base_delay * 2^(attempt-1)
                    let backoff_delay = self.base_delay * 2u32.pow(attempt - 1);
                    let total_delay = backoff_delay + jitter;

                    warn!(
                        "Retrying in {:?} (attempt {}/{})",
                        total_delay, attempt, self.max_retries
                    );
                    sleep(total_delay).await;
                }
            }
        }

        anyhow::bail!("Unexpected error after retries")
    }

    async fn perform_api_call(
        &self,
        url: &str,
        request_body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(url)
            .header("api-key", &self.api_key)
            .json(request_body)
            .send()
            .await
            .context("Failed to send request to Azure OpenAI")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Azure OpenAI error ({}): {}", status, error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse Azure OpenAI response")
    }

    fn into_response(json: serde_json::Value) -> Result<LLMResponse> {
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .context("Failed to extract content from Azure OpenAI response")?
            .to_string();

        let usage = json["usage"].as_object().map(|u| Usage {
            prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as usize,
            completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as usize,
            total_tokens: u["total_tokens"].as_u64().unwrap_or(0) as usize,
        });

        Ok(LLMResponse {
            content,
            finish_reason: json["choices"][0]["finish_reason"]
                .as_str()
                .map(|s| s.to_string()),
            usage,
        })
    }
}

#[async_trait]
impl LLMProvider for AzureOpenAIClient {
    async fn generate(&self, prompt: &str) -> Result<LLMResponse> {
        self.generate_with_context(vec![Message::user(prompt)]).await
    }

    async fn generate_with_context(&self, messages: Vec<Message>) -> Result<LLMResponse> {
        let json = self.call_api(&messages).await?;
        Self::into_response(json)
    }

    async fn stream_generate(&self, messages: Vec<Message>) -> Result<TokenStream> {
        let url = self.completions_url();
        let request_body = self.request_body(&messages, true);

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .context("Failed to open Azure OpenAI stream")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Azure OpenAI error ({}): {}", status, error_text);
        }

        let (tx, rx) = mpsc::unbounded_channel::<Result<String>>();

        tokio::spawn(async move {
            let mut sse = response.bytes_stream().eventsource();

            while let Some(event) = sse.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow!("SSE stream error: {}", e)));
                        return;
                    }
                };

                if event.data == "[DONE]" {
                    return;
                }

                let chunk: serde_json::Value = match serde_json::from_str(&event.data) {
                    Ok(json) => json,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow!(
                            "SSE parsing error: {}, data: {}",
                            e,
                            event.data
                        )));
                        return;
                    }
                };

                if let Some(message) = chunk["error"]["message"].as_str() {
                    let _ = tx.send(Err(anyhow!("SSE API error: {}", message)));
                    return;
                }

                if let Some(delta) = extract_stream_delta(&chunk) {
                    if tx.send(Ok(delta)).is_err() {
                        // Receiver dropped: the caller stopped consuming.
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> AzureOpenAIClient {
        AzureOpenAIClient::new(LLMConfig {
            api_key: "test-key".to_string(),
            endpoint: "https://example.openai.azure.com/".to_string(),
            model: "gpt-4o".to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn completions_url_includes_deployment_and_version() {
        let client = test_client();
        assert_eq!(
            client.completions_url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-05-13"
        );
    }

    #[test]
    fn request_body_carries_roles_and_stream_flag() {
        let client = test_client();
        let body = client.request_body(
            &[Message::system("be terse"), Message::user("hello")],
            true,
        );
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn rejects_missing_credentials() {
        assert!(AzureOpenAIClient::new(LLMConfig::default()).is_err());
    }

    #[tokio::test]
    #[ignore] // Requires deployment credentials
    async fn test_azure_roundtrip() {
        let client = AzureOpenAIClient::from_env().unwrap();
        let response = client.generate("Say hello!").await;
        assert!(response.is_ok());
    }
}
