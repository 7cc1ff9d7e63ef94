//! Caller Rate Governor
//!
//! Per-identity admission control: a trailing 60-second window plus a
//! calendar-day counter, keyed separately for anonymous and authenticated
//! callers. A background sweeper reclaims records of abandoned identities.

mod limiter;
mod sweeper;

pub use limiter::{
    Admission, DenialReason, RateGovernor, RateUsage, SweepReport, TrustLevel,
    anonymous_identifier,
};
pub use sweeper::GovernorSweeper;
