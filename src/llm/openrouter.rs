//! OpenRouter API client implementation
//!
//! Implements the LlmClient trait against the OpenAI-compatible
//! `/chat/completions` endpoint exposed by OpenRouter (and most other
//! providers). All settings, the API key included, come in through
//! `OpenRouterConfig`; nothing is read from the environment here.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::client::{LlmClient, LlmError};
use super::types::{CompletionRequest, CompletionResponse, FinishReason, Role, Usage};

/// OpenRouter API base URL
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model used for instruction proposals
pub const DEFAULT_MODEL: &str = "openai/gpt-4.1";

/// Default max tokens
pub const DEFAULT_MAX_TOKENS: u32 = 32_000;

/// Configuration for the OpenRouter client
#[derive(Clone)]
pub struct OpenRouterConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 1.0,
            timeout: Duration::from_secs(300),
        }
    }
}

// Keep the API key out of logs
impl std::fmt::Debug for OpenRouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// OpenRouter API client
pub struct OpenRouterClient {
    client: Client,
    config: OpenRouterConfig,
    usage: Arc<Mutex<Usage>>,
}

impl OpenRouterClient {
    /// Create a new client
    pub fn new(config: OpenRouterConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            usage: Arc::new(Mutex::new(Usage::default())),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Build the request body for the chat-completions API
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let model = request.model.as_ref().unwrap_or(&self.config.model).clone();
        let max_tokens = request.max_tokens.unwrap_or(self.config.max_tokens);
        let temperature = request.temperature.unwrap_or(self.config.temperature);

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(json!({ "role": Role::System, "content": request.system }));
        }
        messages.extend(request.messages.iter().map(|m| json!({ "role": m.role, "content": m.content })));

        json!({
            "model": model,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": messages
        })
    }

    /// Parse the API response into a CompletionResponse
    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError> {
        if let Some(error) = body.get("error") {
            let message = error["message"].as_str().unwrap_or("unknown error").to_string();
            let status = error["code"].as_u64().unwrap_or(500) as u16;
            return Err(LlmError::ApiError { status, message });
        }

        let choice = body["choices"]
            .get(0)
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        let content = choice["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("choice has no text content".to_string()))?
            .to_string();

        let finish_reason = FinishReason::from_api(choice["finish_reason"].as_str());

        let usage = if let Some(u) = body.get("usage") {
            Usage::new(
                u["prompt_tokens"].as_u64().unwrap_or(0),
                u["completion_tokens"].as_u64().unwrap_or(0),
            )
        } else {
            Usage::default()
        };

        if let Ok(mut total) = self.usage.lock() {
            total.add(&usage);
        }

        Ok(CompletionResponse {
            content,
            finish_reason,
            usage,
        })
    }

    /// Send a request to the API
    async fn send_request(&self, body: Value) -> Result<Value, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }

    /// Get cumulative token usage
    pub fn total_usage(&self) -> Usage {
        self.usage.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request);
        log::debug!("Sending completion request to {} ({})", self.endpoint(), body["model"]);
        let response = self.send_request(body).await?;
        self.parse_response(response)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(api_key: &str) -> OpenRouterConfig {
        OpenRouterConfig {
            api_key: api_key.to_string(),
            ..Default::default()
        }
    }

    fn client() -> OpenRouterClient {
        OpenRouterClient::new(config_with_key("test-key")).unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = OpenRouterConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.temperature, 1.0);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let mut config = config_with_key("k");
        config.base_url = "http://localhost:8080/v1/".to_string();
        let client = OpenRouterClient::new(config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_build_request_basic() {
        let request = CompletionRequest::new("You are helpful").with_user_message("Hello");

        let body = client().build_request(&request);

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are helpful");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "Hello");
    }

    #[test]
    fn test_build_request_without_system() {
        let request = CompletionRequest::default().with_user_message("Hello");
        let body = client().build_request(&request);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn test_build_request_overrides() {
        let mut request = CompletionRequest::new("test")
            .with_user_message("Hello")
            .with_max_tokens(512)
            .with_temperature(0.0);
        request.model = Some("google/gemini-2.5-flash".to_string());

        let body = client().build_request(&request);

        assert_eq!(body["model"], "google/gemini-2.5-flash");
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_parse_response_text() {
        let api_response = json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Hello there!" }, "finish_reason": "stop" }
            ],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5 }
        });

        let response = client().parse_response(api_response).unwrap();

        assert_eq!(response.content, "Hello there!");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage.input_tokens, 10);
        assert_eq!(response.usage.output_tokens, 5);
    }

    #[test]
    fn test_parse_response_truncated() {
        let api_response = json!({
            "choices": [{ "message": { "content": "partial" }, "finish_reason": "length" }]
        });

        let response = client().parse_response(api_response).unwrap();
        assert!(response.finish_reason.is_truncated());
        assert_eq!(response.usage.total(), 0);
    }

    #[test]
    fn test_parse_response_no_choices() {
        let result = client().parse_response(json!({ "choices": [] }));
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_response_null_content() {
        let result = client().parse_response(json!({
            "choices": [{ "message": { "content": null }, "finish_reason": "stop" }]
        }));
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_parse_response_embedded_error() {
        let result = client().parse_response(json!({
            "error": { "message": "Provider returned error", "code": 502 }
        }));

        match result {
            Err(LlmError::ApiError { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "Provider returned error");
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }

    #[test]
    fn test_total_usage_accumulation() {
        let client = client();

        let _ = client.parse_response(json!({
            "choices": [{ "message": { "content": "a" } }],
            "usage": { "prompt_tokens": 100, "completion_tokens": 50 }
        }));
        let _ = client.parse_response(json!({
            "choices": [{ "message": { "content": "b" } }],
            "usage": { "prompt_tokens": 200, "completion_tokens": 100 }
        }));

        let total = client.total_usage();
        assert_eq!(total.input_tokens, 300);
        assert_eq!(total.output_tokens, 150);
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = client();
        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("OpenRouterClient"));
        assert!(debug_str.contains(DEFAULT_MODEL));
        assert!(!debug_str.contains("test-key"));

        let config_str = format!("{:?}", config_with_key("secret"));
        assert!(!config_str.contains("secret"));
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OpenRouterClient>();
    }
}
