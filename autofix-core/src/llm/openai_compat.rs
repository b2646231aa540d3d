//! Chat completions over any OpenAI-compatible endpoint
//!
//! Hosted services and local servers (llama.cpp, vLLM, LM Studio) differ
//! only in base URL, key variable and auth header.

use super::errors::{LLMError, LLMResult};
use super::traits::{ModelProvider, TextStream};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for OpenAI-compatible providers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAICompatConfig {
    pub provider: String,
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub auth_header: String,
    pub auth_prefix: String,
    pub system_prompt: Option<String>,
}

impl Default for OpenAICompatConfig {
    fn default() -> Self {
        Self::openai("gpt-4o-mini")
    }
}

impl OpenAICompatConfig {
    pub fn openai(model: &str) -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: model.to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            timeout_secs: 120,
            auth_header: "Authorization".to_string(),
            auth_prefix: "Bearer".to_string(),
            system_prompt: None,
        }
    }

    pub fn groq(model: &str) -> Self {
        Self {
            provider: "groq".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout_secs: 30,
            ..Self::openai(model)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client
pub struct OpenAICompatProvider {
    client: Client,
    config: OpenAICompatConfig,
}

impl OpenAICompatProvider {
    pub fn new(config: OpenAICompatConfig) -> LLMResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LLMError::config(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAICompatConfig {
        &self.config
    }

    fn build_request(&self, prompt: &str, system: Option<&str>, stream: bool) -> ChatCompletionRequest {
        let mut messages = Vec::new();
        if let Some(system) = system.or(self.config.system_prompt.as_deref()) {
            messages.push(ChatMessage { role: "system".to_string(), content: system.to_string() });
        }
        messages.push(ChatMessage { role: "user".to_string(), content: prompt.to_string() });

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream,
        }
    }

    async fn send(&self, request: &ChatCompletionRequest) -> LLMResult<reqwest::Response> {
        let api_key = std::env::var(&self.config.api_key_env).map_err(|_| {
            LLMError::auth(format!(
                "{} API key not found in ${}",
                self.config.provider, self.config.api_key_env
            ))
        })?;

        let mut req = self.client.post(format!("{}/chat/completions", self.config.base_url));

        if self.config.auth_prefix.is_empty() {
            req = req.header(&self.config.auth_header, api_key);
        } else {
            req = req.header(
                &self.config.auth_header,
                format!("{} {}", self.config.auth_prefix, api_key),
            );
        }

        debug!("Sending request to {} ({})", self.config.provider, self.config.model);
        let response = req.json(request).send().await.map_err(|e| {
            if e.is_timeout() {
                LLMError::timeout(Duration::from_secs(self.config.timeout_secs))
            } else {
                LLMError::network(format!("Failed to send request to {}: {}", self.config.provider, e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let error_text = response.text().await.unwrap_or_default();
        warn!("{} API error ({}): {}", self.config.provider, status, error_text);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LLMError::auth(error_text),
            StatusCode::TOO_MANY_REQUESTS => LLMError::rate_limit(error_text, retry_after),
            _ => LLMError::api(status.as_u16(), error_text),
        })
    }
}

/// Splits streamed bytes into lines
///
/// Chunks can end inside a multi-byte character, so bytes are only decoded
/// once their line is complete.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and return the lines it completes, trimmed
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            lines.push(String::from_utf8_lossy(&line).trim().to_string());
        }
        lines
    }
}

/// Parse the payload of one SSE `data:` line
///
/// Returns `None` for the terminator and for chunks without content.
fn parse_sse_data(data: &str) -> Option<LLMResult<String>> {
    if data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|text| !text.is_empty())
            .map(Ok),
        Err(e) => Some(Err(LLMError::streaming(format!("Invalid stream chunk: {}", e)))),
    }
}

#[async_trait]
impl ModelProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        &self.config.provider
    }

    async fn complete(&self, prompt: &str, system: Option<&str>) -> LLMResult<String> {
        let request = self.build_request(prompt, system, false);
        let response = self.send(&request).await?;

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LLMError::parse(format!("Failed to parse {} response: {}", self.config.provider, e)))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LLMError::parse(format!("No response from {}", self.config.provider)))
    }

    async fn complete_stream(&self, prompt: &str, system: Option<&str>) -> LLMResult<TextStream> {
        let request = self.build_request(prompt, system, true);
        let response = self.send(&request).await?;
        let mut bytes = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = LineBuffer::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(LLMError::streaming(e.to_string()));
                        break;
                    }
                };

                for line in buffer.push(&chunk) {
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    if let Some(data) = line.strip_prefix("data:") {
                        if let Some(item) = parse_sse_data(data.trim()) {
                            yield item;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_includes_system_prompt() {
        let provider = OpenAICompatProvider::new(OpenAICompatConfig::groq("llama3-70b")).unwrap();
        let request = provider.build_request("fix it", Some("you repair code"), false);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.model, "llama3-70b");

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("stream").is_none());

        let streaming = provider.build_request("fix it", None, true);
        assert_eq!(streaming.messages.len(), 1);
        assert_eq!(serde_json::to_value(&streaming).unwrap()["stream"], true);
    }

    #[test]
    fn test_parse_sse_data() {
        let chunk = r#"{"choices":[{"delta":{"content":"Hello"}}]}"#;
        assert_eq!(parse_sse_data(chunk).unwrap().unwrap(), "Hello");

        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert!(parse_sse_data(role_only).is_none());

        assert!(parse_sse_data("[DONE]").is_none());
        assert!(matches!(parse_sse_data("{oops"), Some(Err(LLMError::Stream(_)))));
    }

    #[test]
    fn test_line_buffer_keeps_split_characters() {
        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n\n".as_bytes();
        let split = event.iter().position(|b| *b == 0xA9).unwrap();

        let mut buffer = LineBuffer::default();
        assert!(buffer.push(&event[..split]).is_empty());
        let lines = buffer.push(&event[split..]);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].is_empty());

        let data = lines[0].strip_prefix("data:").unwrap().trim();
        assert_eq!(parse_sse_data(data).unwrap().unwrap(), "café");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_auth_error() {
        let config = OpenAICompatConfig {
            api_key_env: "AUTOFIX_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..OpenAICompatConfig::default()
        };
        let provider = OpenAICompatProvider::new(config).unwrap();
        let err = provider.complete("hi", None).await.unwrap_err();
        assert!(matches!(err, LLMError::Auth(_)));
    }
}
