//! Sliding-Window Admission Control
//!
//! One record per (trust level, identity, day). The admission check prunes,
//! decides and records while holding the DashMap shard lock for that key, so
//! concurrent checks on the same identity are linearizable.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::config::RateLimitConfig;
use crate::constants::rate_limit::{FINGERPRINT_LEN, WINDOW_SECS};
use crate::types::Result;

/// Distinguishes callers whose raw identifiers could collide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Anonymous,
    Authenticated,
}

impl TrustLevel {
    fn tag(&self) -> &'static str {
        match self {
            Self::Anonymous => "anon",
            Self::Authenticated => "user",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    TooFrequent { per_minute: u32 },
    DailyLimit { per_day: u32 },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFrequent { per_minute } => write!(
                f,
                "Too many requests, please try again later (at most {} requests per minute)",
                per_minute
            ),
            Self::DailyLimit { per_day } => write!(
                f,
                "Daily usage limit of {} requests reached, register as a member for more",
                per_day
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Denied(DenialReason),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Caller-facing message for a denial
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Allowed => None,
            Self::Denied(reason) => Some(reason.to_string()),
        }
    }
}

/// Counters for one identity, without running the admission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateUsage {
    pub minute_count: u32,
    pub minute_limit: u32,
    pub daily_count: u32,
    pub daily_limit: u32,
    pub trust: TrustLevel,
}

impl RateUsage {
    pub fn remaining_today(&self) -> u32 {
        self.daily_limit.saturating_sub(self.daily_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RateKey {
    trust: TrustLevel,
    identity: String,
    day: NaiveDate,
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.trust.tag(), self.identity, self.day)
    }
}

#[derive(Debug, Default)]
struct RateRecord {
    minute: VecDeque<DateTime<Utc>>,
    daily_count: u32,
}

impl RateRecord {
    /// Drop entries at or before `cutoff`; entries are in arrival order
    fn prune(&mut self, cutoff: DateTime<Utc>) {
        while self.minute.front().is_some_and(|ts| *ts <= cutoff) {
            self.minute.pop_front();
        }
    }
}

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub pruned_entries: usize,
    pub evicted_records: usize,
    pub remaining_records: usize,
}

pub struct RateGovernor {
    records: DashMap<RateKey, RateRecord>,
    per_minute: u32,
    per_day: u32,
    retention: Duration,
    day_tz: Tz,
    clock: SharedClock,
}

impl RateGovernor {
    pub fn new(config: &RateLimitConfig, clock: SharedClock) -> Result<Self> {
        Ok(Self {
            records: DashMap::new(),
            per_minute: config.per_minute,
            per_day: config.per_day,
            retention: Duration::hours(config.retention_hours),
            day_tz: config.day_timezone()?,
            clock,
        })
    }

    fn key(&self, identity: &str, trust: TrustLevel, now: DateTime<Utc>) -> RateKey {
        RateKey {
            trust,
            identity: identity.to_string(),
            day: now.with_timezone(&self.day_tz).date_naive(),
        }
    }

    fn window_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::seconds(WINDOW_SECS)
    }

    /// Admit or deny one request. Denied attempts are not recorded.
    pub fn check(&self, identity: &str, trust: TrustLevel) -> Admission {
        let now = self.clock.now();
        let key = self.key(identity, trust, now);
        let key_label = key.to_string();

        let mut record = self.records.entry(key).or_default();
        record.prune(Self::window_cutoff(now));

        if record.minute.len() >= self.per_minute as usize {
            debug!(key = %key_label, "Denied: per-minute cap");
            return Admission::Denied(DenialReason::TooFrequent {
                per_minute: self.per_minute,
            });
        }
        if record.daily_count >= self.per_day {
            debug!(key = %key_label, "Denied: daily cap");
            return Admission::Denied(DenialReason::DailyLimit {
                per_day: self.per_day,
            });
        }

        record.minute.push_back(now);
        record.daily_count += 1;
        Admission::Allowed
    }

    pub fn usage(&self, identity: &str, trust: TrustLevel) -> RateUsage {
        let now = self.clock.now();
        let key = self.key(identity, trust, now);
        let cutoff = Self::window_cutoff(now);

        let (minute_count, daily_count) = self
            .records
            .get(&key)
            .map(|r| {
                let minute = r.minute.iter().filter(|ts| **ts > cutoff).count() as u32;
                (minute, r.daily_count)
            })
            .unwrap_or((0, 0));

        RateUsage {
            minute_count,
            minute_limit: self.per_minute,
            daily_count,
            daily_limit: self.per_day,
            trust,
        }
    }

    /// Reclaim memory for abandoned identities.
    ///
    /// Minute entries older than the retention period are dropped. A record
    /// is evicted once its minute list is empty and its day started more than
    /// one retention period ago.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let cutoff = now - self.retention;
        let mut report = SweepReport::default();

        self.records.retain(|key, record| {
            let before = record.minute.len();
            record.prune(cutoff);
            report.pruned_entries += before - record.minute.len();

            let keep = !record.minute.is_empty() || !self.day_expired(key.day, cutoff);
            if !keep {
                report.evicted_records += 1;
            }
            keep
        });
        report.remaining_records = self.records.len();

        info!(
            pruned = report.pruned_entries,
            evicted = report.evicted_records,
            remaining = report.remaining_records,
            "Rate governor sweep complete"
        );
        report
    }

    fn day_expired(&self, day: NaiveDate, cutoff: DateTime<Utc>) -> bool {
        day.and_hms_opt(0, 0, 0)
            .and_then(|midnight| midnight.and_local_timezone(self.day_tz).earliest())
            .map(|start| start.with_timezone(&Utc) < cutoff)
            .unwrap_or(true)
    }

    pub fn tracked_identities(&self) -> usize {
        self.records.len()
    }

    /// Stable fingerprint for callers without an account.
    ///
    /// Derived from ip, user agent and today's date in the governor's zone,
    /// so the same caller maps to a new identity each day.
    pub fn anonymous_identifier(&self, ip: &str, user_agent: &str) -> String {
        let today = self.clock.today_in(self.day_tz);
        anonymous_identifier(ip, user_agent, today)
    }
}

pub fn anonymous_identifier(ip: &str, user_agent: &str, day: NaiveDate) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(user_agent.as_bytes());
    hasher.update(day.format("%Y-%m-%d").to_string().as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
        .chars()
        .take(FINGERPRINT_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn governor() -> (RateGovernor, Arc<ManualClock>) {
        // 2024-03-04 02:00 UTC = 10:00 Taipei
        let clock = ManualClock::shared(Utc.with_ymd_and_hms(2024, 3, 4, 2, 0, 0).unwrap());
        let governor = RateGovernor::new(&RateLimitConfig::default(), clock.clone()).unwrap();
        (governor, clock)
    }

    #[test]
    fn test_sixth_request_in_a_minute_is_denied() {
        let (gov, clock) = governor();
        for _ in 0..5 {
            assert!(gov.check("1.2.3.4", TrustLevel::Anonymous).is_allowed());
            clock.advance(Duration::seconds(1));
        }
        let admission = gov.check("1.2.3.4", TrustLevel::Anonymous);
        assert_eq!(
            admission,
            Admission::Denied(DenialReason::TooFrequent { per_minute: 5 })
        );
        assert!(admission.reason().unwrap().contains("5 requests per minute"));
        // Denials are not recorded
        assert_eq!(gov.usage("1.2.3.4", TrustLevel::Anonymous).daily_count, 5);
    }

    #[test]
    fn test_window_slides() {
        let (gov, clock) = governor();
        for _ in 0..5 {
            assert!(gov.check("u", TrustLevel::Authenticated).is_allowed());
        }
        assert!(!gov.check("u", TrustLevel::Authenticated).is_allowed());
        clock.advance(Duration::seconds(60));
        assert!(gov.check("u", TrustLevel::Authenticated).is_allowed());
    }

    #[test]
    fn test_daily_cap() {
        let (gov, clock) = governor();
        for _ in 0..50 {
            assert!(gov.check("u", TrustLevel::Anonymous).is_allowed());
            clock.advance(Duration::seconds(13));
        }
        assert_eq!(
            gov.check("u", TrustLevel::Anonymous),
            Admission::Denied(DenialReason::DailyLimit { per_day: 50 })
        );
    }

    #[test]
    fn test_trust_levels_are_separate() {
        let (gov, _) = governor();
        for _ in 0..5 {
            assert!(gov.check("42", TrustLevel::Anonymous).is_allowed());
        }
        assert!(!gov.check("42", TrustLevel::Anonymous).is_allowed());
        assert!(gov.check("42", TrustLevel::Authenticated).is_allowed());
    }

    #[test]
    fn test_new_day_resets_daily_count() {
        let (gov, clock) = governor();
        for _ in 0..50 {
            gov.check("u", TrustLevel::Anonymous);
            clock.advance(Duration::seconds(13));
        }
        assert!(!gov.check("u", TrustLevel::Anonymous).is_allowed());
        // 16:00 UTC = midnight Taipei
        clock.set(Utc.with_ymd_and_hms(2024, 3, 4, 16, 0, 0).unwrap());
        assert!(gov.check("u", TrustLevel::Anonymous).is_allowed());
        assert_eq!(gov.usage("u", TrustLevel::Anonymous).daily_count, 1);
    }

    #[test]
    fn test_usage_without_records() {
        let (gov, _) = governor();
        let usage = gov.usage("nobody", TrustLevel::Authenticated);
        assert_eq!(usage.minute_count, 0);
        assert_eq!(usage.remaining_today(), 50);
    }

    #[test]
    fn test_sweep_keeps_recent_and_evicts_stale() {
        let (gov, clock) = governor();
        gov.check("old", TrustLevel::Anonymous);
        clock.advance(Duration::hours(30));
        gov.check("fresh", TrustLevel::Anonymous);

        let report = gov.sweep();
        assert_eq!(report.evicted_records, 1);
        assert_eq!(report.remaining_records, 1);
        assert_eq!(gov.usage("fresh", TrustLevel::Anonymous).daily_count, 1);
    }

    #[test]
    fn test_sweep_keeps_yesterday_within_retention() {
        let (gov, clock) = governor();
        gov.check("u", TrustLevel::Anonymous);
        clock.advance(Duration::hours(20));
        assert_eq!(gov.sweep().evicted_records, 0);
        assert_eq!(gov.tracked_identities(), 1);
    }

    #[test]
    fn test_anonymous_identifier() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let a = anonymous_identifier("1.2.3.4", "curl/8", day);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, anonymous_identifier("1.2.3.4", "curl/8", day));
        assert_ne!(a, anonymous_identifier("1.2.3.5", "curl/8", day));
        let next = day.succ_opt().unwrap();
        assert_ne!(a, anonymous_identifier("1.2.3.4", "curl/8", next));
    }
}
