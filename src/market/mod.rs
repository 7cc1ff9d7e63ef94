//! Market data: trading calendar, quote source, batch fetcher and the
//! background price sync.

pub mod calendar;
pub mod fetcher;
pub mod quote;
pub mod scheduler;
pub mod source;

pub use calendar::{TradingSession, is_trading_session};
pub use fetcher::{FetchReport, IndexKind, IndexQuote, QuoteBatchFetcher, partition};
pub use quote::{QuoteEnvelope, RawQuote, parse_count, parse_decimal};
pub use scheduler::{PriceSyncScheduler, SyncOutcome, SyncReport};
pub use source::{QuoteSource, TwseQuoteSource};
