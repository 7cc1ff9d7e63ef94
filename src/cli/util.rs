//! CLI Common Utilities
//!
//! Shared initialization for command handlers: configuration, the database
//! and the components built from them.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::ai::AiGateway;
use crate::clock::{SharedClock, SystemClock};
use crate::config::{Config, ConfigLoader};
use crate::governor::RateGovernor;
use crate::market::{PriceSyncScheduler, QuoteBatchFetcher, TradingSession, TwseQuoteSource};
use crate::storage::{Database, SharedDatabase, SqlitePriceStore};
use crate::types::{Result, StockError};

/// Command execution context
///
/// Created via `CommandContext::load()`; components are built on demand so
/// commands that only read the database never construct HTTP clients.
#[derive(Clone)]
pub struct CommandContext {
    pub config: Config,
    pub db: SharedDatabase,
    pub clock: SharedClock,
}

impl CommandContext {
    /// Load configuration and open (initializing) the database.
    pub fn load() -> Result<Self> {
        let config = ConfigLoader::load()?;
        let db = Database::open(&config.storage.database_path)?;
        db.initialize()?;

        Ok(Self {
            config,
            db: Arc::new(db),
            clock: SystemClock::shared(),
        })
    }

    pub fn store(&self) -> Arc<SqlitePriceStore> {
        Arc::new(SqlitePriceStore::new(self.db.clone(), self.clock.clone()))
    }

    pub fn session(&self) -> Result<TradingSession> {
        TradingSession::from_config(&self.config.market)
    }

    pub fn fetcher(&self) -> Result<QuoteBatchFetcher> {
        let source = TwseQuoteSource::new(&self.config.quotes)?;
        Ok(QuoteBatchFetcher::new(
            Arc::new(source),
            &self.config.quotes,
            self.clock.clone(),
        ))
    }

    pub fn scheduler(&self) -> Result<PriceSyncScheduler> {
        Ok(PriceSyncScheduler::new(
            self.store(),
            self.fetcher()?,
            self.session()?,
            self.clock.clone(),
        )
        .with_tick_interval(self.config.scheduler.tick_interval())
        .with_universe_cap(self.config.quotes.universe_cap))
    }

    pub fn gateway(&self) -> Result<AiGateway> {
        AiGateway::from_config(&self.config.ai, self.clock.clone())
    }

    pub fn governor(&self) -> Result<Arc<RateGovernor>> {
        Ok(Arc::new(RateGovernor::new(
            &self.config.rate_limit,
            self.clock.clone(),
        )?))
    }
}

/// Parse an RFC 3339 timestamp given on the command line.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StockError::Config(format!("Invalid timestamp '{}': {}", raw, e)))
}

/// Signed number with an explicit `+`, e.g. `+5.50`
pub fn signed(value: f64) -> String {
    if value > 0.0 {
        format!("+{:.2}", value)
    } else {
        format!("{:.2}", value)
    }
}
