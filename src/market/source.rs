//! Quote Source
//!
//! One upstream request per batch of venue-qualified channels.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use tracing::debug;
use url::Url;

use super::quote::{QuoteEnvelope, RawQuote};
use crate::ai::with_timeout;
use crate::config::QuoteConfig;
use crate::constants::quotes;
use crate::types::{Result, StockError};

/// Upstream that resolves a batch of channels (e.g. `tse_2330.tw`) to records
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_channels(&self, channels: &[String]) -> Result<Vec<RawQuote>>;
}

/// HTTP quote endpoint speaking the `ex_ch` / `msgArray` protocol
#[derive(Debug, Clone)]
pub struct TwseQuoteSource {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl TwseQuoteSource {
    pub fn new(config: &QuoteConfig) -> Result<Self> {
        Url::parse(&config.base_url).map_err(|e| {
            StockError::Config(format!(
                "quotes.base_url '{}' is not a valid URL: {}",
                config.base_url, e
            ))
        })?;

        Ok(Self {
            base_url: config.base_url.clone(),
            timeout: config.request_timeout(),
            client: build_client(config.request_timeout())?,
        })
    }

    /// `<base>?ex_ch=a|b&json=1&delay=0`, with `|` left unescaped as the upstream expects
    pub fn request_url(&self, channels: &[String]) -> String {
        format!(
            "{}?ex_ch={}&json=1&delay=0",
            self.base_url,
            channels.join("|")
        )
    }
}

#[async_trait]
impl QuoteSource for TwseQuoteSource {
    async fn fetch_channels(&self, channels: &[String]) -> Result<Vec<RawQuote>> {
        if channels.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.request_url(channels);
        debug!(channels = channels.len(), "Requesting quotes");

        // Bounds the body read as well as the send
        with_timeout(self.timeout, self.request(&url), "quote request").await
    }
}

impl TwseQuoteSource {
    async fn request(&self, url: &str) -> Result<Vec<RawQuote>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StockError::upstream(format!(
                "Quote source returned HTTP {}",
                status.as_u16()
            )));
        }

        let envelope: QuoteEnvelope = response
            .json()
            .await
            .map_err(|e| StockError::upstream(format!("Malformed quote envelope: {}", e)))?;

        if !envelope.is_success() {
            return Err(StockError::upstream(format!(
                "Quote source rejected request ({}): {}",
                envelope.rtcode, envelope.rtmessage
            )));
        }

        Ok(envelope.records)
    }
}

/// The endpoint refuses requests that do not look like a browser
fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(quotes::USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(quotes::ACCEPT));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(quotes::ACCEPT_LANGUAGE),
    );
    headers.insert(REFERER, HeaderValue::from_static(quotes::REFERER));

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| StockError::Config(format!("Failed to create HTTP client: {}", e)))
}
