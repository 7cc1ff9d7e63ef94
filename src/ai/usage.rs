//! Per-Provider Daily Usage Tracking
//!
//! Each provider owns one [`UsageTracker`]. All mutable state lives in a
//! single struct behind one `RwLock`, so the daily count, the exhausted flag
//! and the day of record always move together.
//!
//! ## Day Rollover
//!
//! The day of record is the calendar date in the configured zone. Every read
//! and every write first compares it with today; on mismatch the daily count
//! resets to zero, the exhausted flag clears and `last_reset` is stamped.
//! The error count is cumulative and survives rollover.

use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;

/// Usage snapshot for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub provider: String,
    pub daily_count: u64,
    pub daily_limit: u64,
    pub last_reset: DateTime<Utc>,
    pub exhausted: bool,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub last_used: Option<DateTime<Utc>>,
}

impl ProviderUsage {
    pub fn usage_percentage(&self) -> f64 {
        if self.daily_limit == 0 {
            return 0.0;
        }
        self.daily_count as f64 / self.daily_limit as f64 * 100.0
    }
}

#[derive(Debug)]
struct UsageInner {
    usage: ProviderUsage,
    day: NaiveDate,
}

/// Thread-safe daily usage tracker.
pub struct UsageTracker {
    clock: SharedClock,
    day_tz: Tz,
    /// `None` means the provider never exhausts
    exhaustion_ratio: Option<f64>,
    inner: RwLock<UsageInner>,
}

impl UsageTracker {
    pub fn new(
        provider: impl Into<String>,
        daily_limit: u64,
        exhaustion_ratio: f64,
        day_tz: Tz,
        clock: SharedClock,
    ) -> Self {
        Self::build(provider.into(), daily_limit, Some(exhaustion_ratio), day_tz, clock)
    }

    /// Tracker that counts usage but never marks itself exhausted
    pub fn unlimited(provider: impl Into<String>, daily_limit: u64, day_tz: Tz, clock: SharedClock) -> Self {
        Self::build(provider.into(), daily_limit, None, day_tz, clock)
    }

    fn build(
        provider: String,
        daily_limit: u64,
        exhaustion_ratio: Option<f64>,
        day_tz: Tz,
        clock: SharedClock,
    ) -> Self {
        let now = clock.now();
        let day = now.with_timezone(&day_tz).date_naive();
        Self {
            inner: RwLock::new(UsageInner {
                usage: ProviderUsage {
                    provider,
                    daily_count: 0,
                    daily_limit,
                    last_reset: now,
                    exhausted: false,
                    error_count: 0,
                    last_error: None,
                    last_used: None,
                },
                day,
            }),
            clock,
            day_tz,
            exhaustion_ratio,
        }
    }

    /// Current usage, after applying the rollover rule
    pub fn snapshot(&self) -> ProviderUsage {
        let now = self.clock.now();
        {
            let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());
            if inner.day == self.day_of(now) {
                return inner.usage.clone();
            }
        }
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        self.roll_over(&mut inner, now);
        inner.usage.clone()
    }

    pub fn is_exhausted(&self) -> bool {
        self.snapshot().exhausted
    }

    /// A request reached the upstream and succeeded
    pub fn record_success(&self) {
        self.record(None);
    }

    /// A request reached the upstream (or tried to) and failed
    pub fn record_failure(&self, message: impl Into<String>) {
        self.record(Some(message.into()));
    }

    /// The provider refused locally without consuming upstream quota
    pub fn record_rejected(&self, message: impl Into<String>) {
        let now = self.clock.now();
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        self.roll_over(&mut inner, now);
        inner.usage.error_count += 1;
        inner.usage.last_error = Some(message.into());
    }

    fn record(&self, error: Option<String>) {
        let now = self.clock.now();
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        self.roll_over(&mut inner, now);

        let usage = &mut inner.usage;
        usage.daily_count += 1;
        usage.last_used = Some(now);
        if let Some(message) = error {
            usage.error_count += 1;
            usage.last_error = Some(message);
        }

        if let Some(ratio) = self.exhaustion_ratio
            && !usage.exhausted
            && usage.daily_count as f64 >= usage.daily_limit as f64 * ratio
        {
            usage.exhausted = true;
            tracing::warn!(
                provider = %usage.provider,
                daily_count = usage.daily_count,
                daily_limit = usage.daily_limit,
                "Provider reached its daily margin, marking exhausted"
            );
        }
    }

    fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.day_tz).date_naive()
    }

    fn roll_over(&self, inner: &mut UsageInner, now: DateTime<Utc>) {
        let today = self.day_of(now);
        if inner.day == today {
            return;
        }
        tracing::info!(
            provider = %inner.usage.provider,
            previous_day = %inner.day,
            previous_count = inner.usage.daily_count,
            "Daily usage reset"
        );
        inner.day = today;
        inner.usage.daily_count = 0;
        inner.usage.exhausted = false;
        inner.usage.last_reset = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn clock_at(h: u32, m: u32) -> Arc<ManualClock> {
        // 2024-03-04 is a Monday; UTC times, Taipei is +8
        ManualClock::shared(Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap())
    }

    fn tracker(limit: u64, clock: Arc<ManualClock>) -> UsageTracker {
        UsageTracker::new("groq", limit, 0.9, chrono_tz::Asia::Taipei, clock)
    }

    #[test]
    fn test_exhausts_at_ninety_percent() {
        let clock = clock_at(2, 0);
        let usage = tracker(10, clock);

        for _ in 0..8 {
            usage.record_success();
        }
        assert!(!usage.is_exhausted());

        usage.record_failure("HTTP 500");
        let snapshot = usage.snapshot();
        assert!(snapshot.exhausted);
        assert_eq!(snapshot.daily_count, 9);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.last_error.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn test_rejected_does_not_consume_quota() {
        let usage = tracker(10, clock_at(2, 0));
        usage.record_rejected("Daily limit exceeded");
        let snapshot = usage.snapshot();
        assert_eq!(snapshot.daily_count, 0);
        assert_eq!(snapshot.error_count, 1);
        assert!(snapshot.last_used.is_none());
    }

    #[test]
    fn test_rollover_at_local_midnight() {
        // 15:30 UTC = 23:30 Taipei
        let clock = clock_at(15, 30);
        let usage = tracker(10, clock.clone());
        for _ in 0..9 {
            usage.record_success();
        }
        assert!(usage.is_exhausted());

        // 16:10 UTC = 00:10 next day in Taipei
        clock.advance(Duration::minutes(40));
        let snapshot = usage.snapshot();
        assert!(!snapshot.exhausted);
        assert_eq!(snapshot.daily_count, 0);
        assert_eq!(snapshot.last_reset, clock.now());
    }

    #[test]
    fn test_error_count_survives_rollover() {
        let clock = clock_at(15, 30);
        let usage = tracker(10, clock.clone());
        usage.record_failure("HTTP 503");
        clock.advance(Duration::hours(1));
        let snapshot = usage.snapshot();
        assert_eq!(snapshot.daily_count, 0);
        assert_eq!(snapshot.error_count, 1);
    }

    #[test]
    fn test_unlimited_never_exhausts() {
        let usage = UsageTracker::unlimited("simulation", 3, chrono_tz::UTC, clock_at(2, 0));
        for _ in 0..10 {
            usage.record_success();
        }
        let snapshot = usage.snapshot();
        assert!(!snapshot.exhausted);
        assert_eq!(snapshot.daily_count, 10);
    }

    #[test]
    fn test_usage_percentage() {
        let usage = tracker(200, clock_at(2, 0));
        for _ in 0..50 {
            usage.record_success();
        }
        assert!((usage.snapshot().usage_percentage() - 25.0).abs() < f64::EPSILON);
    }
}
