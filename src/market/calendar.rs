//! Trading Session Calendar
//!
//! Pure time arithmetic: no state, no I/O. Holidays are not modelled; a
//! weekday holiday polls once per tick and writes nothing new.

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::config::MarketConfig;
use crate::types::{Result, StockError};

/// Daily trading window of one venue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingSession {
    pub timezone: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for TradingSession {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Taipei,
            open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(13, 30, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl TradingSession {
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime) -> Result<Self> {
        if open > close {
            return Err(StockError::Config(format!(
                "Session opens at {} but closes at {}",
                open.format("%H:%M"),
                close.format("%H:%M")
            )));
        }
        Ok(Self {
            timezone,
            open,
            close,
        })
    }

    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        let (open, close) = config.session_bounds()?;
        Self::new(config.timezone()?, open, close)
    }

    /// True on a weekday whose local wall-clock minute lies in `[open, close]`.
    ///
    /// Seconds are truncated, so 13:30:59 still counts as the closing minute.
    pub fn is_open(&self, ts: DateTime<Utc>) -> bool {
        let local = ts.with_timezone(&self.timezone);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let Some(minute) = NaiveTime::from_hms_opt(local.hour(), local.minute(), 0) else {
            return false;
        };
        minute >= self.open && minute <= self.close
    }
}

/// Session check against the default 09:00-13:30 window in `timezone`.
pub fn is_trading_session(ts: DateTime<Utc>, timezone: Tz) -> bool {
    TradingSession {
        timezone,
        ..TradingSession::default()
    }
    .is_open(ts)
}
