//! Google Gemini Provider
//!
//! Generative language API. The key travels as a query parameter.

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

const PROVIDER: &str = "gemini";
const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub struct GeminiProvider {
    api_key: Option<SecretString>,
    api_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
    usage: UsageTracker,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(config: &AiConfig, clock: SharedClock) -> Result<Self> {
        let settings = &config.gemini;
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

    fn build_request(&self, text: String) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_tokens,
                temperature: self.temperature,
            },
        }
    }

    async fn call(&self, api_key: &SecretString, text: String) -> ProviderResult<String> {
        let request = self.build_request(text);
        debug!(model = %self.model, "Sending request to Gemini API");

        let body: GenerateContentResponse = send_json(
            self.client
                .post(&self.api_url)
                .query(&[("key", api_key.expose_secret())])
                .json(&request),
            PROVIDER,
        )
        .await?;

        non_empty(PROVIDER, body.first_text())
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
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

        info!(model = %self.model, conversation = %context.conversation_id, "Generating with Gemini");
        let result = self.call(api_key, build_prompt(prompt, context)).await;
        match &result {
            Ok(_) => self.usage.record_success(),
            Err(err) => self.usage.record_failure(&err.message),
        }
        result
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn name(&self) -> &str {
        "Google Gemini API"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some() && !self.usage.is_exhausted()
    }

    fn usage_stats(&self) -> ProviderUsage {
        self.usage.snapshot()
    }
}

// =============================================================================
// Gemini API Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

impl GenerateContentResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
    }
}
