//! Groq API Provider
//!
//! OpenAI-compatible chat completions endpoint with bearer authentication.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    AiProvider, ConversationContext, ProviderResult, build_http_client, build_prompt, non_empty,
    send_json,
};
use crate::ai::usage::{ProviderUsage, UsageTracker};
use crate::clock::SharedClock;
use crate::config::{AiConfig, ProviderKind};
use crate::types::{ProviderError, Result};

const PROVIDER: &str = "groq";
const API_KEY_ENV: &str = "GROQ_API_KEY";

pub struct GroqProvider {
    /// Never exposed in logs or debug output
    api_key: Option<SecretString>,
    api_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
    usage: UsageTracker,
}

impl std::fmt::Debug for GroqProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GroqProvider {
    pub fn new(config: &AiConfig, clock: SharedClock) -> Result<Self> {
        let settings = &config.groq;
        Ok(Self {
            api_key: settings.resolved_api_key(API_KEY_ENV).map(SecretString::from),
            api_url: settings.api_url.clone(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            client: build_http_client(config.request_timeout())?,
            usage: UsageTracker::new(
                PROVIDER,
                settings.daily_limit,
                config.exhaustion_ratio,
                config.day_timezone()?,
                clock,
            ),
        })
    }

    fn build_request(&self, content: String) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        }
    }

    async fn call(&self, api_key: &SecretString, content: String) -> ProviderResult<String> {
        let request = self.build_request(content);
        debug!(model = %self.model, "Sending request to Groq API");

        let body: ChatCompletionResponse = send_json(
            self.client
                .post(&self.api_url)
                .bearer_auth(api_key.expose_secret())
                .json(&request),
            PROVIDER,
        )
        .await?;

        non_empty(PROVIDER, body.first_text())
    }
}

#[async_trait]
impl AiProvider for GroqProvider {
    async fn generate(&self, prompt: &str, context: &ConversationContext) -> ProviderResult<String> {
        if self.usage.is_exhausted() {
            let err = ProviderError::quota_exceeded(PROVIDER);
            self.usage.record_rejected(&err.message);
            return Err(err);
        }
        let Some(api_key) = &self.api_key else {
            let err = ProviderError::other(PROVIDER, "API key not configured");
            self.usage.record_rejected(&err.message);
            return Err(err);
        };

        info!(model = %self.model, conversation = %context.conversation_id, "Generating with Groq");
        let result = self.call(api_key, build_prompt(prompt, context)).await;
        match &result {
            Ok(_) => self.usage.record_success(),
            Err(err) => self.usage.record_failure(&err.message),
        }
        result
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Groq
    }

    fn name(&self) -> &str {
        "Groq API"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some() && !self.usage.is_exhausted()
    }

    fn usage_stats(&self) -> ProviderUsage {
        self.usage.snapshot()
    }
}

// =============================================================================
// Groq API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn first_text(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::StockContext;
    use crate::clock::SystemClock;
    use serde_json::json;

    fn provider(api_key: Option<&str>) -> GroqProvider {
        let mut config = AiConfig::default();
        config.groq.api_key = api_key.map(String::from);
        let mut provider = GroqProvider::new(&config, SystemClock::shared()).unwrap();
        // Isolate from any GROQ_API_KEY in the environment
        provider.api_key = api_key.map(|k| SecretString::from(k.to_string()));
        provider
    }

    #[test]
    fn test_request_shape() {
        let provider = provider(Some("test-key"));
        let context = ConversationContext::new("c1").with_stock(StockContext::new("2330"));
        let request = provider.build_request(build_prompt("hello", &context));
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], json!("llama-3.1-8b-instant"));
        assert_eq!(value["messages"][0]["role"], json!("user"));
        assert_eq!(value["messages"][0]["content"], json!("Stock: 2330\nQuestion: hello"));
        assert_eq!(value["max_tokens"], json!(100));
        assert_eq!(value["stream"], json!(false));
    }

    #[test]
    fn test_response_first_choice() {
        let body: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "first"}},
                {"message": {"role": "assistant", "content": "second"}}
            ],
            "usage": {"total_tokens": 12}
        }))
        .unwrap();
        assert_eq!(body.first_text().as_deref(), Some("first"));
    }

    #[test]
    fn test_response_without_choices() {
        let body: ChatCompletionResponse = serde_json::from_value(json!({})).unwrap();
        assert!(non_empty(PROVIDER, body.first_text()).is_err());
    }

    #[test]
    fn test_unavailable_without_key() {
        assert!(!provider(None).is_available());
        assert!(provider(Some("k")).is_available());
    }

    #[tokio::test]
    async fn test_missing_key_refuses_without_network() {
        let provider = provider(None);
        let err = provider
            .generate("hello", &ConversationContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.message, "API key not configured");
        let usage = provider.usage_stats();
        assert_eq!(usage.daily_count, 0);
        assert_eq!(usage.error_count, 1);
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", provider(Some("super-secret")));
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
