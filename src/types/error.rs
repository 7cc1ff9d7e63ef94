//! Unified Error Type System
//!
//! Centralized error types for the resilience core.
//!
//! ## Failure Kinds
//!
//! - **QuotaExceeded**: provider refused locally, daily margin reached
//! - **RateLimited**: upstream answered HTTP 429
//! - **Network**: transport, DNS or timeout failure
//! - **Parse**: upstream answered but the body was unusable
//! - **Other**: any other non-success status
//!
//! Every provider produces a [`ProviderError`]; [`FailoverDecision::classify`]
//! is the single place those are folded into the gateway's decision vocabulary.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Provider Failures
// =============================================================================

/// Closed set of ways a provider call can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    QuotaExceeded,
    RateLimited,
    Network,
    Parse,
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded => write!(f, "QUOTA_EXCEEDED"),
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::Network => write!(f, "NETWORK"),
            Self::Parse => write!(f, "PARSE_ERROR"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// Failure reported by a single provider attempt
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub kind: FailureKind,
    pub message: String,
    pub provider: String,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.provider, self.kind, self.message)
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    pub fn new(kind: FailureKind, provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: provider.into(),
        }
    }

    pub fn quota_exceeded(provider: impl Into<String>) -> Self {
        Self::new(FailureKind::QuotaExceeded, provider, "Daily limit exceeded")
    }

    pub fn rate_limited(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimited, provider, message)
    }

    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, provider, message)
    }

    pub fn parse(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Parse, provider, message)
    }

    pub fn other(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureKind::Other, provider, message)
    }

    /// Build from a non-success HTTP status
    pub fn from_status(provider: impl Into<String>, status: u16, reason: &str) -> Self {
        let message = format!("HTTP {}: {}", status, reason);
        Self::new(classify_http_status(status), provider, message)
    }

    /// Build from a reqwest transport error
    pub fn from_transport(provider: impl Into<String>, err: &reqwest::Error) -> Self {
        if err.is_decode() {
            Self::parse(provider, format!("Failed to decode response: {}", err))
        } else {
            Self::network(provider, format!("Request failed: {}", err))
        }
    }
}

/// Map a non-success status code to a failure kind
pub fn classify_http_status(status: u16) -> FailureKind {
    match status {
        429 => FailureKind::RateLimited,
        _ => FailureKind::Other,
    }
}

// =============================================================================
// Failover Decision
// =============================================================================

/// Gateway-level view of a provider failure.
///
/// Parse failures are folded into `NetworkError`. Every variant triggers a
/// fallback; the tag drives logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverDecision {
    QuotaExceeded,
    RateLimited,
    NetworkError,
    Other,
}

impl FailoverDecision {
    pub fn classify(err: &ProviderError) -> Self {
        match err.kind {
            FailureKind::QuotaExceeded => Self::QuotaExceeded,
            FailureKind::RateLimited => Self::RateLimited,
            FailureKind::Network | FailureKind::Parse => Self::NetworkError,
            FailureKind::Other => Self::Other,
        }
    }
}

impl std::fmt::Display for FailoverDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuotaExceeded => write!(f, "quota-exceeded"),
            Self::RateLimited => write!(f, "rate-limited"),
            Self::NetworkError => write!(f, "network-error"),
            Self::Other => write!(f, "other"),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum StockError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Quote source answered but the response was unusable
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

impl From<r2d2::Error> for StockError {
    fn from(err: r2d2::Error) -> Self {
        StockError::Storage(format!("Connection pool error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, StockError>;

impl StockError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| StockError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| StockError::Storage(format!("{}: {}", f().into(), e)))
    }
}
