//! Market Domain Types
//!
//! Symbols and the price snapshots the sync cycle keeps current.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing venue for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    /// Primary exchange (TSE)
    #[default]
    Listed,
    /// Secondary market (OTC)
    OverTheCounter,
}

impl Venue {
    /// Prefix the quote source expects in `ex_ch`
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Listed => "tse",
            Self::OverTheCounter => "otc",
        }
    }

    /// Guess the venue from a bare code: four-digit codes starting 1-9 are listed.
    pub fn infer(code: &str) -> Self {
        let bytes = code.as_bytes();
        if bytes.len() == 4 && (b'1'..=b'9').contains(&bytes[0]) {
            Self::Listed
        } else {
            Self::OverTheCounter
        }
    }

    /// Venue-qualified channel, e.g. `tse_2330.tw`
    pub fn channel(&self, code: &str) -> String {
        format!("{}_{}.tw", self.prefix(), code)
    }
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listed => write!(f, "TSE"),
            Self::OverTheCounter => write!(f, "OTC"),
        }
    }
}

impl std::str::FromStr for Venue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tse" | "listed" => Ok(Self::Listed),
            "otc" | "overthecounter" => Ok(Self::OverTheCounter),
            _ => Err(format!("Unknown venue: {}. Valid values: tse, otc", s)),
        }
    }
}

/// A tradable instrument in the symbol universe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub code: String,
    pub name: String,
    pub category: String,
    pub venue: Venue,
    pub active: bool,
}

impl Symbol {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        let code = code.into();
        let venue = Venue::infer(&code);
        Self {
            code,
            name: name.into(),
            category: String::new(),
            venue,
            active: true,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_venue(mut self, venue: Venue) -> Self {
        self.venue = venue;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Current price of one symbol. One per active symbol, replaced each cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub code: String,
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub prev_close: f64,
    pub volume: i64,
    pub amount: f64,
    pub change: f64,
    pub change_percent: f64,
    pub observed_at: DateTime<Utc>,
}

impl PriceSnapshot {
    /// Only snapshots with a strictly positive price are persisted
    pub fn is_persistable(&self) -> bool {
        self.price > 0.0
    }
}

/// Absolute and percentage change against the previous close.
///
/// A zero previous close yields a zero percentage.
pub fn price_change(price: f64, prev_close: f64) -> (f64, f64) {
    let change = price - prev_close;
    let percent = if prev_close > 0.0 {
        change / prev_close * 100.0
    } else {
        0.0
    };
    (change, percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_infer() {
        assert_eq!(Venue::infer("2330"), Venue::Listed);
        assert_eq!(Venue::infer("1101"), Venue::Listed);
        assert_eq!(Venue::infer("0050"), Venue::OverTheCounter);
        assert_eq!(Venue::infer("00878"), Venue::OverTheCounter);
        assert_eq!(Venue::infer("6488A"), Venue::OverTheCounter);
    }

    #[test]
    fn test_venue_channel() {
        assert_eq!(Venue::Listed.channel("2330"), "tse_2330.tw");
        assert_eq!(Venue::OverTheCounter.channel("6488"), "otc_6488.tw");
    }

    #[test]
    fn test_price_change() {
        let (change, pct) = price_change(580.5, 575.0);
        assert!((change - 5.5).abs() < 1e-9);
        assert!((pct - 0.956_521_739).abs() < 1e-6);

        assert_eq!(price_change(10.0, 0.0), (10.0, 0.0));
    }

    #[test]
    fn test_symbol_builder() {
        let symbol = Symbol::new("2330", "TSMC").with_category("Semiconductor");
        assert_eq!(symbol.venue, Venue::Listed);
        assert!(symbol.active);
        assert!(!symbol.inactive().active);
    }
}
