pub mod error;
pub mod market;

pub use error::{
    FailoverDecision, FailureKind, ProviderError, Result, ResultExt, StockError,
    classify_http_status,
};
pub use market::{PriceSnapshot, Symbol, Venue, price_change};
