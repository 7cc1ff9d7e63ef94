//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/stockpulse/) and project (.stockpulse/) level configuration.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::constants::{ai, market, quotes, rate_limit, scheduler, storage};
use crate::types::{Result, StockError};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// AI gateway and provider settings
    pub ai: AiConfig,

    /// Caller rate governor settings
    pub rate_limit: RateLimitConfig,

    /// Quote source settings
    pub quotes: QuoteConfig,

    /// Trading session settings
    pub market: MarketConfig,

    /// Price sync scheduler settings
    pub scheduler: SchedulerConfig,

    /// Local storage settings
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            ai: AiConfig::default(),
            rate_limit: RateLimitConfig::default(),
            quotes: QuoteConfig::default(),
            market: MarketConfig::default(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `StockError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.ai.request_timeout_secs == 0 {
            return Err(StockError::Config(
                "ai.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(self.ai.exhaustion_ratio > 0.0 && self.ai.exhaustion_ratio <= 1.0) {
            return Err(StockError::Config(format!(
                "ai.exhaustion_ratio must be in (0, 1], got {}",
                self.ai.exhaustion_ratio
            )));
        }

        for (name, settings) in [
            ("groq", &self.ai.groq),
            ("gemini", &self.ai.gemini),
            ("huggingface", &self.ai.huggingface),
        ] {
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(StockError::Config(format!(
                    "ai.{}.temperature must be between 0.0 and 2.0, got {}",
                    name, settings.temperature
                )));
            }
            if settings.daily_limit == 0 {
                return Err(StockError::Config(format!(
                    "ai.{}.daily_limit must be greater than 0",
                    name
                )));
            }
        }

        if self.rate_limit.per_minute == 0 || self.rate_limit.per_day == 0 {
            return Err(StockError::Config(
                "rate_limit caps must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit.sweep_interval_secs == 0 {
            return Err(StockError::Config(
                "rate_limit.sweep_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.quotes.chunk_size == 0 {
            return Err(StockError::Config(
                "quotes.chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.tick_interval_secs == 0 {
            return Err(StockError::Config(
                "scheduler.tick_interval_secs must be greater than 0".to_string(),
            ));
        }

        let (open, close) = self.market.session_bounds()?;
        if open >= close {
            return Err(StockError::Config(format!(
                "market.session_open ({}) must be before market.session_close ({})",
                open, close
            )));
        }

        self.market.timezone()?;
        self.rate_limit.day_timezone()?;
        self.ai.day_timezone()?;

        Ok(())
    }
}

fn parse_timezone(field: &str, value: &str) -> Result<Tz> {
    value
        .parse::<Tz>()
        .map_err(|e| StockError::Config(format!("{} '{}' is not a valid zone: {}", field, value, e)))
}

// =============================================================================
// AI Configuration
// =============================================================================

/// Remote text-generation backends plus the local simulation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    HuggingFace,
    #[default]
    Groq,
    Gemini,
    Simulation,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HuggingFace => "huggingface",
            Self::Groq => "groq",
            Self::Gemini => "gemini",
            Self::Simulation => "simulation",
        }
    }

    /// Fixed pairing between the two paid backends
    pub fn backup(&self) -> Option<ProviderKind> {
        match self {
            Self::Groq => Some(Self::Gemini),
            Self::Gemini => Some(Self::Groq),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "groq" => Ok(Self::Groq),
            "gemini" => Ok(Self::Gemini),
            "simulation" => Ok(Self::Simulation),
            _ => Err(format!(
                "Unknown provider: {}. Valid values: huggingface, groq, gemini, simulation",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Provider tried first
    pub primary: ProviderKind,

    /// Per-provider request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Fraction of the daily limit that marks a provider exhausted
    pub exhaustion_ratio: f64,

    /// Zone whose midnight resets provider usage counters
    pub day_timezone: String,

    pub groq: ProviderSettings,
    pub gemini: ProviderSettings,
    pub huggingface: ProviderSettings,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            primary: ProviderKind::Groq,
            request_timeout_secs: ai::REQUEST_TIMEOUT_SECS,
            exhaustion_ratio: ai::EXHAUSTION_RATIO,
            day_timezone: market::TIMEZONE.to_string(),
            groq: ProviderSettings::new(ai::groq::API_URL, ai::groq::MODEL, ai::groq::DAILY_LIMIT),
            gemini: ProviderSettings::new(
                ai::gemini::API_URL,
                ai::gemini::MODEL,
                ai::gemini::DAILY_LIMIT,
            ),
            huggingface: ProviderSettings::new(
                ai::huggingface::API_URL,
                ai::huggingface::MODEL,
                ai::huggingface::DAILY_LIMIT,
            ),
        }
    }
}

impl AiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn day_timezone(&self) -> Result<Tz> {
        parse_timezone("ai.day_timezone", &self.day_timezone)
    }
}

/// Configuration for one remote provider
///
/// Note: API keys are never serialized to output and are redacted in debug
/// output. Each provider converts the key to SecretString internally.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Endpoint URL; an empty string disables the provider
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub daily_limit: u64,
}

impl ProviderSettings {
    pub fn new(api_url: &str, model: &str, daily_limit: u64) -> Self {
        Self {
            api_url: api_url.to_string(),
            api_key: None,
            model: model.to_string(),
            max_tokens: ai::DEFAULT_MAX_TOKENS,
            temperature: ai::DEFAULT_TEMPERATURE,
            daily_limit,
        }
    }

    /// Configured key, falling back to the conventional environment variable
    pub fn resolved_api_key(&self, env_var: &str) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(env_var).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::new("", "", ai::groq::DAILY_LIMIT)
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("daily_limit", &self.daily_limit)
            .finish()
    }
}

// =============================================================================
// Rate Limit Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted in any trailing 60 seconds
    pub per_minute: u32,
    /// Requests admitted per calendar day
    pub per_day: u32,
    /// Interval between background sweeps (seconds)
    pub sweep_interval_secs: u64,
    /// Idle records older than this are reclaimed (hours)
    pub retention_hours: i64,
    /// Zone whose midnight starts a new daily count
    pub day_timezone: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: rate_limit::PER_MINUTE,
            per_day: rate_limit::PER_DAY,
            sweep_interval_secs: rate_limit::SWEEP_INTERVAL_SECS,
            retention_hours: rate_limit::RETENTION_HOURS,
            day_timezone: market::TIMEZONE.to_string(),
        }
    }
}

impl RateLimitConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn day_timezone(&self) -> Result<Tz> {
        parse_timezone("rate_limit.day_timezone", &self.day_timezone)
    }
}

// =============================================================================
// Quote Source Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteConfig {
    pub base_url: String,
    /// Maximum symbols per upstream request
    pub chunk_size: usize,
    /// Pause between chunks (milliseconds)
    pub chunk_delay_ms: u64,
    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
    /// Maximum symbols read from storage per cycle
    pub universe_cap: usize,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_url: quotes::BASE_URL.to_string(),
            chunk_size: quotes::CHUNK_SIZE,
            chunk_delay_ms: quotes::CHUNK_DELAY_MS,
            request_timeout_secs: quotes::REQUEST_TIMEOUT_SECS,
            universe_cap: quotes::UNIVERSE_CAP,
        }
    }
}

impl QuoteConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Market Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// IANA zone of the venue
    pub timezone: String,
    /// Session open, "HH:MM" local
    pub session_open: String,
    /// Session close, "HH:MM" local, inclusive
    pub session_close: String,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            timezone: market::TIMEZONE.to_string(),
            session_open: market::SESSION_OPEN.to_string(),
            session_close: market::SESSION_CLOSE.to_string(),
        }
    }
}

impl MarketConfig {
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone("market.timezone", &self.timezone)
    }

    pub fn session_bounds(&self) -> Result<(NaiveTime, NaiveTime)> {
        let parse = |field: &str, value: &str| {
            NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| {
                StockError::Config(format!("{} '{}' is not HH:MM: {}", field, value, e))
            })
        };
        Ok((
            parse("market.session_open", &self.session_open)?,
            parse("market.session_close", &self.session_close)?,
        ))
    }
}

// =============================================================================
// Scheduler Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Period between sync ticks (seconds)
    pub tick_interval_secs: u64,
    /// Start the scheduler when `run` starts
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: scheduler::TICK_INTERVAL_SECS,
            enabled: true,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(storage::DATABASE_PATH),
        }
    }
}
