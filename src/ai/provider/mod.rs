//! AI Provider Abstraction
//!
//! Defines the [`AiProvider`] trait shared by every text-generation backend.
//! Providers own their usage tracker and report failures as
//! [`ProviderError`] so the gateway can classify them.
//!
//! ## Modules
//!
//! - `groq`: OpenAI-style chat completions
//! - `gemini`: Google generative language API
//! - `huggingface`: hosted inference endpoint
//! - `simulation`: local canned replies, always available

mod gemini;
mod groq;
mod huggingface;
mod prompt_utils;
mod simulation;

pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use huggingface::HuggingFaceProvider;
pub use prompt_utils::{build_prompt, stock_summary};
pub use simulation::SimulationProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::usage::ProviderUsage;
use crate::clock::SharedClock;
use crate::config::{AiConfig, ProviderKind};
use crate::types::{ProviderError, Result, StockError};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

pub type SharedProvider = Arc<dyn AiProvider>;

// =============================================================================
// Conversation Context
// =============================================================================

/// Stock the caller is asking about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockContext {
    pub code: String,
    pub name: Option<String>,
    pub current_price: Option<f64>,
    pub change: Option<f64>,
    pub market: Option<String>,
}

impl StockContext {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub conversation_id: String,
    pub stock: Option<StockContext>,
}

impl ConversationContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            stock: None,
        }
    }

    pub fn with_stock(mut self, stock: StockContext) -> Self {
        self.stock = Some(stock);
        self
    }
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Uniform capability of every text-generation backend
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Generate a reply. Exhausted providers refuse with `QuotaExceeded`
    /// before any network activity.
    async fn generate(&self, prompt: &str, context: &ConversationContext) -> ProviderResult<String>;

    fn kind(&self) -> ProviderKind;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Configured and not exhausted for today
    fn is_available(&self) -> bool;

    fn usage_stats(&self) -> ProviderUsage;
}

// =============================================================================
// Shared HTTP plumbing
// =============================================================================

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| StockError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Send a JSON request and decode a JSON response, classifying failures.
///
/// URLs are stripped from transport errors since some carry the API key.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    provider: &str,
) -> ProviderResult<T> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::from_transport(provider, &e.without_url()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        debug!(provider, status = status.as_u16(), body = %body, "Upstream rejected request");
        return Err(ProviderError::from_status(
            provider,
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown status"),
        ));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::from_transport(provider, &e.without_url()))
}

/// Reject empty generations so the gateway falls through
pub(crate) fn non_empty(provider: &str, text: Option<String>) -> ProviderResult<String> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ProviderError::parse(provider, "No response generated")),
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Build every remote provider whose endpoint is configured, plus simulation.
pub fn create_providers(config: &AiConfig, clock: SharedClock) -> Result<Vec<SharedProvider>> {
    let day_tz = config.day_timezone()?;
    let mut providers: Vec<SharedProvider> = Vec::new();

    if !config.groq.api_url.is_empty() {
        providers.push(Arc::new(GroqProvider::new(config, clock.clone())?));
    }
    if !config.gemini.api_url.is_empty() {
        providers.push(Arc::new(GeminiProvider::new(config, clock.clone())?));
    }
    if !config.huggingface.api_url.is_empty() {
        providers.push(Arc::new(HuggingFaceProvider::new(config, clock.clone())?));
    }
    providers.push(Arc::new(SimulationProvider::new(day_tz, clock)));

    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn test_non_empty_rejects_blank() {
        assert!(non_empty("groq", None).is_err());
        let err = non_empty("groq", Some("   ".to_string())).unwrap_err();
        assert_eq!(err.kind, crate::types::FailureKind::Parse);
        assert_eq!(non_empty("groq", Some("hi".to_string())).unwrap(), "hi");
    }

    #[test]
    fn test_create_providers_skips_unconfigured_endpoint() {
        let mut config = AiConfig::default();
        config.huggingface.api_url.clear();
        let providers = create_providers(&config, SystemClock::shared()).unwrap();
        let kinds: Vec<_> = providers.iter().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![ProviderKind::Groq, ProviderKind::Gemini, ProviderKind::Simulation]
        );
    }
}
