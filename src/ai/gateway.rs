//! AI Gateway with Provider Failover
//!
//! Routes each prompt through a fixed chain and never surfaces an error.
//!
//! ## Strategy
//!
//! 1. Try the configured primary if it reports itself available
//! 2. On failure, classify the error (logging only) and fall back
//! 3. Try the paired backup (Groq <-> Gemini) if available
//! 4. Fall through to the simulation provider, which always answers
//!
//! Every attempt is bounded by the configured request timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::provider::{
    AiProvider, ConversationContext, SharedProvider, SimulationProvider, create_providers,
};
use super::timeout::with_timeout_map;
use super::usage::ProviderUsage;
use crate::clock::SharedClock;
use crate::config::{AiConfig, ProviderKind};
use crate::types::{FailoverDecision, ProviderError, Result};

/// Fallback text if even the simulation provider is missing or times out
const LAST_RESORT_REPLY: &str = "Sorry, the assistant is busy right now. Please try again shortly.";

/// Record of one failed attempt
#[derive(Debug, Clone)]
pub struct FailedAttempt {
    pub provider: ProviderKind,
    pub decision: FailoverDecision,
    pub message: String,
}

/// Gateway answer, including which provider produced it
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub text: String,
    pub provider: ProviderKind,
    pub failures: Vec<FailedAttempt>,
}

impl GatewayReply {
    pub fn used_fallback(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct AiGateway {
    primary: ProviderKind,
    providers: HashMap<ProviderKind, SharedProvider>,
    /// Registration order, for stable statistics output
    order: Vec<ProviderKind>,
    request_timeout: Duration,
}

impl AiGateway {
    pub fn builder(primary: ProviderKind) -> AiGatewayBuilder {
        AiGatewayBuilder::new(primary)
    }

    /// Register every configured provider plus simulation
    pub fn from_config(config: &AiConfig, clock: SharedClock) -> Result<Self> {
        let mut builder = Self::builder(config.primary).with_request_timeout(config.request_timeout());
        for provider in create_providers(config, clock)? {
            builder = builder.add_shared(provider);
        }
        Ok(builder.build())
    }

    pub fn primary(&self) -> ProviderKind {
        self.primary
    }

    /// Paid chain tried before simulation
    fn chain(&self) -> Vec<ProviderKind> {
        if self.primary == ProviderKind::Simulation {
            return Vec::new();
        }
        let mut chain = vec![self.primary];
        if let Some(backup) = self.primary.backup() {
            chain.push(backup);
        }
        chain
    }

    #[instrument(skip(self, prompt, context), fields(primary = %self.primary, conversation = %context.conversation_id))]
    pub async fn generate(&self, prompt: &str, context: &ConversationContext) -> GatewayReply {
        let mut failures = Vec::new();

        for kind in self.chain() {
            let Some(provider) = self.providers.get(&kind) else {
                debug!(provider = %kind, "Provider not registered, skipping");
                continue;
            };
            if !provider.is_available() {
                debug!(provider = %kind, "Provider unavailable, skipping");
                continue;
            }

            match self.attempt(provider.as_ref(), prompt, context).await {
                Ok(text) => {
                    info!(provider = %kind, fallbacks = failures.len(), "Gateway answered");
                    return GatewayReply {
                        text,
                        provider: kind,
                        failures,
                    };
                }
                Err(err) => {
                    let decision = FailoverDecision::classify(&err);
                    warn!(provider = %kind, %decision, error = %err, "Provider failed, falling back");
                    failures.push(FailedAttempt {
                        provider: kind,
                        decision,
                        message: err.message,
                    });
                }
            }
        }

        let text = match self.providers.get(&ProviderKind::Simulation) {
            Some(simulation) => match self.attempt(simulation.as_ref(), prompt, context).await {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "Simulation provider failed");
                    LAST_RESORT_REPLY.to_string()
                }
            },
            None => LAST_RESORT_REPLY.to_string(),
        };
        info!(fallbacks = failures.len(), "Gateway answered with simulation");

        GatewayReply {
            text,
            provider: ProviderKind::Simulation,
            failures,
        }
    }

    async fn attempt(
        &self,
        provider: &dyn AiProvider,
        prompt: &str,
        context: &ConversationContext,
    ) -> std::result::Result<String, ProviderError> {
        let operation = format!("{} generate", provider.kind());
        match with_timeout_map(self.request_timeout, provider.generate(prompt, context), &operation).await {
            Ok(result) => result,
            Err(timeout) => Err(ProviderError::network(
                provider.kind().as_str(),
                timeout.to_string(),
            )),
        }
    }

    /// Usage snapshot of every registered provider
    pub fn service_stats(&self) -> Vec<ProviderUsage> {
        self.order
            .iter()
            .filter_map(|kind| self.providers.get(kind))
            .map(|p| p.usage_stats())
            .collect()
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&SharedProvider> {
        self.providers.get(&kind)
    }
}

/// Builder for [`AiGateway`]
pub struct AiGatewayBuilder {
    primary: ProviderKind,
    providers: Vec<SharedProvider>,
    request_timeout: Duration,
}

impl AiGatewayBuilder {
    pub fn new(primary: ProviderKind) -> Self {
        Self {
            primary,
            providers: Vec::new(),
            request_timeout: Duration::from_secs(crate::constants::ai::REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn add_provider(self, provider: impl AiProvider + 'static) -> Self {
        self.add_shared(Arc::new(provider))
    }

    /// Later registrations of the same kind replace earlier ones
    pub fn add_shared(mut self, provider: SharedProvider) -> Self {
        self.providers.retain(|p| p.kind() != provider.kind());
        self.providers.push(provider);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_simulation(self, day_tz: chrono_tz::Tz, clock: SharedClock) -> Self {
        self.add_provider(SimulationProvider::new(day_tz, clock))
    }

    pub fn build(self) -> AiGateway {
        let order = self.providers.iter().map(|p| p.kind()).collect();
        let providers = self.providers.into_iter().map(|p| (p.kind(), p)).collect();
        AiGateway {
            primary: self.primary,
            providers,
            order,
            request_timeout: self.request_timeout,
        }
    }
}
