//! StockPulse - Resilience Core for a Stock Assistant
//!
//! The parts of a stock-assistant backend that keep it answering and keep
//! its prices current while upstreams misbehave.
//!
//! ## Core Features
//!
//! - **AI Gateway**: primary → paired backup → local simulation failover,
//!   per-provider daily quotas with explicit day rollover
//! - **Rate Governor**: per-identity sliding-window and daily admission caps
//! - **Market Calendar**: venue-local trading session checks
//! - **Quote Batch Fetcher**: chunked, throttled, best-effort quote retrieval
//! - **Price Sync Scheduler**: market-hours polling into SQLite
//!
//! ## Quick Start
//!
//! ```ignore
//! use stockpulse::{AiGateway, ConfigLoader, ConversationContext, SystemClock};
//!
//! let config = ConfigLoader::load()?;
//! let gateway = AiGateway::from_config(&config.ai, SystemClock::shared())?;
//! let reply = gateway.generate("How is 2330 doing?", &ConversationContext::new("c-1")).await;
//! println!("{} (via {})", reply.text, reply.provider);
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: provider clients, usage tracking, failover gateway
//! - [`governor`]: caller rate governing and its background sweep
//! - [`market`]: calendar, quote source, batch fetcher, sync scheduler
//! - [`storage`]: SQLite persistence with connection pooling
//! - [`config`]: layered configuration

pub mod ai;
pub mod cli;
pub mod clock;
pub mod config;
pub mod constants;
pub mod governor;
pub mod market;
pub mod storage;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{Config, ConfigLoader, ProviderKind};
pub use types::{
    FailoverDecision, FailureKind, PriceSnapshot, ProviderError, Result, ResultExt, StockError,
    Symbol, Venue,
};

// Storage
pub use storage::{Database, PoolConfig, SharedDatabase, SqlitePriceStore, SymbolStore};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    AiGateway, AiGatewayBuilder, AiProvider, ConversationContext, GatewayReply, ProviderUsage,
    SharedProvider, StockContext,
};

// =============================================================================
// Governor & Market Re-exports
// =============================================================================

pub use governor::{Admission, DenialReason, GovernorSweeper, RateGovernor, RateUsage, TrustLevel};

pub use market::{
    IndexKind, PriceSyncScheduler, QuoteBatchFetcher, QuoteSource, SyncOutcome, SyncReport,
    TradingSession, TwseQuoteSource, is_trading_session,
};
