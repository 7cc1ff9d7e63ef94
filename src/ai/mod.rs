//! AI Integration Layer
//!
//! Provider clients, per-provider usage tracking and the failover gateway.

pub mod gateway;
pub mod provider;
pub mod timeout;
pub mod usage;

pub use gateway::{AiGateway, AiGatewayBuilder, FailedAttempt, GatewayReply};
pub use provider::{
    AiProvider, ConversationContext, GeminiProvider, GroqProvider, HuggingFaceProvider,
    ProviderResult, SharedProvider, SimulationProvider, StockContext, build_prompt,
    create_providers,
};
pub use timeout::{with_timeout, with_timeout_map};
pub use usage::{ProviderUsage, UsageTracker};
