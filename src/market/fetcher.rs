//! Quote Batch Fetcher
//!
//! Splits a symbol list into upstream-sized chunks, fetches them one after
//! another with a pause in between, and converts whatever comes back.
//! A failed chunk is logged and skipped; it never aborts the batch.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::quote::{RawQuote, parse_decimal};
use super::source::QuoteSource;
use crate::clock::SharedClock;
use crate::config::QuoteConfig;
use crate::types::{PriceSnapshot, Result, StockError, Symbol, Venue, price_change};

/// Market-wide index published alongside the per-symbol quotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Listed market weighted index
    Taiex,
    /// Over-the-counter index
    Otc,
}

impl IndexKind {
    pub const ALL: [IndexKind; 2] = [IndexKind::Taiex, IndexKind::Otc];

    pub fn channel(&self) -> &'static str {
        match self {
            Self::Taiex => "tse_t00.tw",
            Self::Otc => "otc_o00.tw",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Taiex => "TAIEX",
            Self::Otc => "OTC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuote {
    pub kind: IndexKind,
    pub value: f64,
    pub prev_close: f64,
    pub change: f64,
    pub change_percent: f64,
}

/// Outcome of one batched fetch
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub snapshots: Vec<PriceSnapshot>,
    pub chunks: usize,
    pub failed_chunks: usize,
    /// The token fired before every chunk was attempted
    pub cancelled: bool,
}

/// Split `items` into consecutive chunks of at most `size`, preserving order.
pub fn partition<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

pub struct QuoteBatchFetcher {
    source: Arc<dyn QuoteSource>,
    chunk_size: usize,
    chunk_delay: Duration,
    clock: SharedClock,
}

impl QuoteBatchFetcher {
    pub fn new(source: Arc<dyn QuoteSource>, config: &QuoteConfig, clock: SharedClock) -> Self {
        Self {
            source,
            chunk_size: config.chunk_size.max(1),
            chunk_delay: config.chunk_delay(),
            clock,
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, chunk_delay: Duration) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.chunk_delay = chunk_delay;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Best-effort snapshots for bare codes; the venue is inferred per code.
    pub async fn fetch(&self, codes: &[String], cancel: &CancellationToken) -> Vec<PriceSnapshot> {
        let channels: Vec<String> = codes
            .iter()
            .map(|code| Venue::infer(code).channel(code))
            .collect();
        self.fetch_detailed(&channels, cancel).await.snapshots
    }

    /// Snapshots for stored symbols, using each symbol's recorded venue.
    pub async fn fetch_symbols(
        &self,
        symbols: &[Symbol],
        cancel: &CancellationToken,
    ) -> FetchReport {
        let channels: Vec<String> = symbols
            .iter()
            .map(|s| s.venue.channel(&s.code))
            .collect();
        self.fetch_detailed(&channels, cancel).await
    }

    /// Fetch venue-qualified channels chunk by chunk.
    pub async fn fetch_detailed(
        &self,
        channels: &[String],
        cancel: &CancellationToken,
    ) -> FetchReport {
        let chunks = partition(channels, self.chunk_size);
        let mut report = FetchReport {
            chunks: chunks.len(),
            ..Default::default()
        };

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !self.pause(cancel).await {
                report.cancelled = true;
                break;
            }
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.source.fetch_channels(chunk).await {
                Ok(records) => {
                    let observed_at = self.clock.now();
                    let before = report.snapshots.len();
                    report.snapshots.extend(
                        records
                            .iter()
                            .filter(|r| !r.code.trim().is_empty())
                            .map(|r| r.to_snapshot(observed_at)),
                    );
                    debug!(
                        chunk = index + 1,
                        of = report.chunks,
                        requested = chunk.len(),
                        received = report.snapshots.len() - before,
                        "Quote chunk fetched"
                    );
                }
                Err(e) => {
                    report.failed_chunks += 1;
                    warn!(
                        chunk = index + 1,
                        of = report.chunks,
                        error = %e,
                        "Quote chunk failed, skipping"
                    );
                }
            }
        }

        if report.chunks > 0 {
            info!(
                requested = channels.len(),
                fetched = report.snapshots.len(),
                failed_chunks = report.failed_chunks,
                "Quote batch finished"
            );
        }
        report
    }

    /// Current value of a market index.
    pub async fn fetch_index(&self, kind: IndexKind) -> Result<IndexQuote> {
        let records = self
            .source
            .fetch_channels(&[kind.channel().to_string()])
            .await?;
        let record = records.first().ok_or_else(|| {
            StockError::upstream(format!("No data returned for index {}", kind.label()))
        })?;
        Ok(index_quote(kind, record))
    }

    /// Sleep between chunks; false if cancelled first.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        if self.chunk_delay.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.chunk_delay) => true,
        }
    }
}

fn index_quote(kind: IndexKind, record: &RawQuote) -> IndexQuote {
    let value = parse_decimal(&record.price);
    let prev_close = parse_decimal(&record.prev_close);
    let (change, change_percent) = price_change(value, prev_close);
    IndexQuote {
        kind,
        value,
        prev_close,
        change,
        change_percent,
    }
}
