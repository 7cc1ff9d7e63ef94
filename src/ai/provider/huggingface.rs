//! Hugging Face Inference Provider
//!
//! Hosted text-generation endpoint. The token is optional; the provider is
//! available whenever an endpoint is configured.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    AiProvider, ConversationContext, ProviderResult, build_http_client, build_prompt, non_empty,
    send_json,
};
use crate::ai::usage::{ProviderUsage, UsageTracker};
use crate::clock::SharedClock;
use crate::config::{AiConfig, ProviderKind};
use crate::types::{ProviderError, Result};

const PROVIDER: &str = "huggingface";
const API_TOKEN_ENV: &str = "HUGGINGFACE_API_TOKEN";

pub struct HuggingFaceProvider {
    api_token: Option<SecretString>,
    api_url: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
    usage: UsageTracker,
}

impl std::fmt::Debug for HuggingFaceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuggingFaceProvider")
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_url", &self.api_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl HuggingFaceProvider {
    pub fn new(config: &AiConfig, clock: SharedClock) -> Result<Self> {
        let settings = &config.huggingface;

        if let Err(e) = url::Url::parse(&settings.api_url) {
            warn!(url = %settings.api_url, error = %e, "Hugging Face endpoint is not a valid URL");
        }

        Ok(Self {
            api_token: settings.resolved_api_key(API_TOKEN_ENV).map(SecretString::from),
            api_url: settings.api_url.clone(),
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

    fn build_request(&self, inputs: String) -> InferenceRequest {
        InferenceRequest {
            inputs,
            parameters: InferenceParameters {
                max_length: self.max_tokens,
                temperature: self.temperature,
                do_sample: true,
            },
        }
    }

    async fn call(&self, inputs: String) -> ProviderResult<String> {
        let request = self.build_request(inputs);
        debug!(url = %self.api_url, "Sending request to Hugging Face");

        let mut builder = self.client.post(&self.api_url).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let body: Vec<Generation> = send_json(builder, PROVIDER).await?;
        non_empty(PROVIDER, body.into_iter().next().map(|g| g.generated_text))
    }
}

#[async_trait]
impl AiProvider for HuggingFaceProvider {
    async fn generate(&self, prompt: &str, context: &ConversationContext) -> ProviderResult<String> {
        if self.usage.is_exhausted() {
            let err = ProviderError::quota_exceeded(PROVIDER);
            self.usage.record_rejected(&err.message);
            return Err(err);
        }

        info!(conversation = %context.conversation_id, "Generating with Hugging Face");
        let result = self.call(build_prompt(prompt, context)).await;
        match &result {
            Ok(_) => self.usage.record_success(),
            Err(err) => self.usage.record_failure(&err.message),
        }
        result
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    fn name(&self) -> &str {
        "Hugging Face API"
    }

    fn is_available(&self) -> bool {
        !self.api_url.is_empty() && !self.usage.is_exhausted()
    }

    fn usage_stats(&self) -> ProviderUsage {
        self.usage.snapshot()
    }
}

#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_length: u32,
    temperature: f32,
    do_sample: bool,
}

#[derive(Debug, Deserialize)]
struct Generation {
    #[serde(default)]
    generated_text: String,
}
