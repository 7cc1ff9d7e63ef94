//! Background sweep driver for the rate governor.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::RateGovernor;

/// Periodically runs [`RateGovernor::sweep`] until cancelled.
pub struct GovernorSweeper {
    governor: Arc<RateGovernor>,
    interval: Duration,
}

impl GovernorSweeper {
    pub fn new(governor: Arc<RateGovernor>, interval: Duration) -> Self {
        Self { governor, interval }
    }

    /// Spawn the sweep loop. The first sweep runs one interval after start.
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(
                tokio::time::Instant::now() + self.interval,
                self.interval,
            );
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            info!(interval_secs = self.interval.as_secs(), "Rate governor sweeper started");

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        info!("Rate governor sweeper shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        self.governor.sweep();
                    }
                }
            }
        })
    }
}
