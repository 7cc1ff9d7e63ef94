//! Price Sync Scheduler
//!
//! Idle until [`PriceSyncScheduler::start`], then one sync cycle per tick:
//! gate on the trading session, read the active universe, fetch quotes,
//! replace-write every snapshot with a positive price.
//!
//! `stop()` is stop-before-next-tick: an in-flight cycle finishes, and a
//! `start()` issued meanwhile waits for it before its own first tick.
//! `shutdown()` also aborts the in-flight cycle between chunks and writes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::calendar::TradingSession;
use super::fetcher::QuoteBatchFetcher;
use crate::clock::SharedClock;
use crate::storage::SymbolStore;
use crate::types::{Result, StockError};

/// Counts from one completed sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Active symbols read from storage
    pub symbols: usize,
    /// Snapshots returned by the fetcher
    pub fetched: usize,
    pub written: usize,
    /// Snapshots dropped for a zero or invalid price
    pub discarded: usize,
    pub failed_writes: usize,
    pub failed_chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Market closed and not forced; nothing fetched or written
    Skipped,
    Completed(SyncReport),
}

struct SyncCycle {
    store: Arc<dyn SymbolStore>,
    fetcher: QuoteBatchFetcher,
    session: TradingSession,
    clock: SharedClock,
    universe_cap: usize,
}

impl SyncCycle {
    #[instrument(skip(self, abort))]
    async fn run(&self, force: bool, abort: &CancellationToken) -> Result<SyncOutcome> {
        if !force && !self.session.is_open(self.clock.now()) {
            debug!("Market closed, sync skipped");
            return Ok(SyncOutcome::Skipped);
        }

        let symbols = self.store.active_symbols(self.universe_cap)?;
        let mut report = SyncReport {
            symbols: symbols.len(),
            ..Default::default()
        };
        if symbols.is_empty() {
            debug!("No active symbols to sync");
            return Ok(SyncOutcome::Completed(report));
        }

        let fetched = self.fetcher.fetch_symbols(&symbols, abort).await;
        if fetched.cancelled {
            return Err(StockError::Cancelled("price sync aborted during fetch".into()));
        }
        report.fetched = fetched.snapshots.len();
        report.failed_chunks = fetched.failed_chunks;

        for snapshot in &fetched.snapshots {
            if abort.is_cancelled() {
                return Err(StockError::Cancelled("price sync aborted during writes".into()));
            }
            if !snapshot.is_persistable() {
                report.discarded += 1;
                continue;
            }
            match self.store.upsert_price(snapshot) {
                Ok(()) => report.written += 1,
                Err(e) => {
                    report.failed_writes += 1;
                    warn!(code = %snapshot.code, error = %e, "Failed to store price");
                }
            }
        }

        info!(
            symbols = report.symbols,
            fetched = report.fetched,
            written = report.written,
            discarded = report.discarded,
            failed_writes = report.failed_writes,
            forced = force,
            "Price sync completed"
        );
        Ok(SyncOutcome::Completed(report))
    }
}

struct RunState {
    stop: CancellationToken,
    abort: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct PriceSyncScheduler {
    cycle: Arc<SyncCycle>,
    tick_interval: Duration,
    state: Mutex<Option<RunState>>,
}

impl PriceSyncScheduler {
    pub fn new(
        store: Arc<dyn SymbolStore>,
        fetcher: QuoteBatchFetcher,
        session: TradingSession,
        clock: SharedClock,
    ) -> Self {
        Self {
            cycle: Arc::new(SyncCycle {
                store,
                fetcher,
                session,
                clock,
                universe_cap: crate::constants::quotes::UNIVERSE_CAP,
            }),
            tick_interval: Duration::from_secs(crate::constants::scheduler::TICK_INTERVAL_SECS),
            state: Mutex::new(None),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Only takes effect before the first `start()`
    pub fn with_universe_cap(mut self, cap: usize) -> Self {
        if let Some(cycle) = Arc::get_mut(&mut self.cycle) {
            cycle.universe_cap = cap;
        }
        self
    }

    /// Arm the periodic timer. Returns false if already running.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let draining = match state.take() {
            Some(run) if run.handle.is_finished() => None,
            Some(run) if !run.stop.is_cancelled() => {
                *state = Some(run);
                return false;
            }
            other => other,
        };

        // A stopped loop may still be mid-cycle: the new loop inherits its
        // abort token and joins it before ticking.
        let (abort, previous) = match draining {
            Some(run) => (run.abort, Some(run.handle)),
            None => (CancellationToken::new(), None),
        };
        let stop = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.cycle.clone(),
            self.tick_interval,
            stop.clone(),
            abort.clone(),
            previous,
        ));

        *state = Some(RunState {
            stop,
            abort,
            handle,
        });
        info!(
            tick_secs = self.tick_interval.as_secs_f64(),
            "Price sync scheduler started"
        );
        true
    }

    /// Disarm the timer; an in-flight cycle is allowed to finish.
    /// Returns false if already idle.
    pub fn stop(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        match state.as_ref() {
            Some(run) if !run.stop.is_cancelled() && !run.handle.is_finished() => {
                run.stop.cancel();
                info!("Price sync scheduler stopping");
                true
            }
            _ => false,
        }
    }

    /// Stop, abort any in-flight cycle, and wait for the loop to exit.
    pub async fn shutdown(&self) {
        let taken = self
            .state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(run) = taken {
            run.stop.cancel();
            run.abort.cancel();
            if let Err(e) = run.handle.await {
                warn!(error = %e, "Price sync loop ended abnormally");
            }
            info!("Price sync scheduler shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .is_some_and(|s| !s.stop.is_cancelled() && !s.handle.is_finished())
    }

    /// Run one cycle now, outside the timer.
    pub async fn sync_once(&self, force: bool) -> Result<SyncOutcome> {
        self.cycle.run(force, &CancellationToken::new()).await
    }

    /// Operator-triggered refresh that ignores the trading session.
    pub async fn force_sync_now(&self) -> Result<SyncReport> {
        match self.sync_once(true).await? {
            SyncOutcome::Completed(report) => Ok(report),
            SyncOutcome::Skipped => Ok(SyncReport::default()),
        }
    }
}

impl Drop for PriceSyncScheduler {
    fn drop(&mut self) {
        if let Some(run) = self.state.get_mut().unwrap_or_else(|p| p.into_inner()).take() {
            run.stop.cancel();
            run.abort.cancel();
        }
    }
}

async fn run_loop(
    cycle: Arc<SyncCycle>,
    period: Duration,
    stop: CancellationToken,
    abort: CancellationToken,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous
        && let Err(e) = previous.await
    {
        warn!(error = %e, "Previous price sync loop ended abnormally");
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                match cycle.run(false, &abort).await {
                    Ok(_) => {}
                    Err(StockError::Cancelled(reason)) => {
                        info!(%reason, "Price sync cycle aborted");
                        break;
                    }
                    Err(e) => warn!(error = %e, "Price sync cycle failed"),
                }
            }
        }
    }
    debug!("Price sync loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::QuoteConfig;
    use crate::market::quote::RawQuote;
    use crate::market::source::QuoteSource;
    use crate::types::{PriceSnapshot, Symbol};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct MemoryStore {
        symbols: Vec<Symbol>,
        prices: Mutex<Vec<PriceSnapshot>>,
        fail_code: Option<String>,
    }

    impl SymbolStore for MemoryStore {
        fn active_symbols(&self, limit: usize) -> Result<Vec<Symbol>> {
            Ok(self
                .symbols
                .iter()
                .filter(|s| s.active)
                .take(limit)
                .cloned()
                .collect())
        }

        fn upsert_price(&self, snapshot: &PriceSnapshot) -> Result<()> {
            if self.fail_code.as_deref() == Some(snapshot.code.as_str()) {
                return Err(StockError::Storage("disk full".into()));
            }
            let mut prices = self.prices.lock().unwrap();
            prices.retain(|p| p.code != snapshot.code);
            prices.push(snapshot.clone());
            Ok(())
        }
    }

    /// Quotes every channel at 100, except code 2317 which has no trade
    #[derive(Default)]
    struct StubSource {
        calls: AtomicU32,
        latency: Duration,
        in_flight: AtomicU32,
        peak_in_flight: AtomicU32,
    }

    impl StubSource {
        fn slow(latency: Duration) -> Self {
            Self {
                latency,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl QuoteSource for StubSource {
        async fn fetch_channels(&self, channels: &[String]) -> Result<Vec<RawQuote>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            Ok(channels
                .iter()
                .map(|channel| {
                    let code = channel[4..channel.len() - 3].to_string();
                    let price = if code == "2317" { "--" } else { "100.0" };
                    RawQuote {
                        code,
                        price: price.to_string(),
                        prev_close: "99.0".to_string(),
                        ..Default::default()
                    }
                })
                .collect())
        }
    }

    /// Monday 10:00 Taipei
    fn open_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 2, 0, 0).unwrap()
    }

    /// Saturday 10:00 Taipei
    fn closed_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 2, 0, 0).unwrap()
    }

    fn scheduler(
        store: Arc<MemoryStore>,
        source: Arc<StubSource>,
        at: chrono::DateTime<Utc>,
    ) -> PriceSyncScheduler {
        let clock = ManualClock::shared(at);
        let fetcher = QuoteBatchFetcher::new(source, &QuoteConfig::default(), clock.clone())
            .with_chunking(20, Duration::ZERO);
        PriceSyncScheduler::new(store, fetcher, TradingSession::default(), clock)
    }

    fn universe() -> Vec<Symbol> {
        vec![
            Symbol::new("2330", "TSMC"),
            Symbol::new("2317", "Hon Hai"),
            Symbol::new("2454", "MediaTek"),
            Symbol::new("1101", "Taiwan Cement").inactive(),
        ]
    }

    #[tokio::test]
    async fn test_closed_market_skips_without_fetching() {
        let store = Arc::new(MemoryStore {
            symbols: universe(),
            ..Default::default()
        });
        let source = Arc::new(StubSource::default());
        let scheduler = scheduler(store.clone(), source.clone(), closed_time());

        assert_eq!(scheduler.sync_once(false).await.unwrap(), SyncOutcome::Skipped);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(store.prices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_force_bypasses_gate_and_drops_zero_prices() {
        let store = Arc::new(MemoryStore {
            symbols: universe(),
            ..Default::default()
        });
        let source = Arc::new(StubSource::default());
        let scheduler = scheduler(store.clone(), source.clone(), closed_time());

        let report = scheduler.force_sync_now().await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                symbols: 3,
                fetched: 3,
                written: 2,
                discarded: 1,
                failed_writes: 0,
                failed_chunks: 0,
            }
        );

        let prices = store.prices.lock().unwrap();
        assert!(prices.iter().all(|p| p.code != "2317"));
        assert!(prices.iter().all(|p| p.price > 0.0));
    }

    #[tokio::test]
    async fn test_write_failure_does_not_abort_batch() {
        let store = Arc::new(MemoryStore {
            symbols: universe(),
            fail_code: Some("2330".to_string()),
            ..Default::default()
        });
        let scheduler = scheduler(store.clone(), Arc::new(StubSource::default()), open_time());

        let SyncOutcome::Completed(report) = scheduler.sync_once(false).await.unwrap() else {
            panic!("expected a completed cycle during the session");
        };
        assert_eq!(report.failed_writes, 1);
        assert_eq!(report.written, 1);
        assert_eq!(store.prices.lock().unwrap()[0].code, "2454");
    }

    #[tokio::test]
    async fn test_universe_cap_limits_symbols() {
        let store = Arc::new(MemoryStore {
            symbols: universe(),
            ..Default::default()
        });
        let scheduler = scheduler(store, Arc::new(StubSource::default()), open_time())
            .with_universe_cap(1);

        let report = scheduler.force_sync_now().await.unwrap();
        assert_eq!(report.symbols, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_stop_idempotent() {
        let store = Arc::new(MemoryStore {
            symbols: universe(),
            ..Default::default()
        });
        let source = Arc::new(StubSource::default());
        let scheduler = scheduler(store, source.clone(), open_time())
            .with_tick_interval(Duration::from_secs(5));

        assert!(!scheduler.stop());
        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.is_running());

        // Ticks at 0s, 5s and 10s
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert!(!scheduler.is_running());

        assert!(scheduler.start());
        scheduler.shutdown().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_during_inflight_cycle_never_overlaps() {
        let store = Arc::new(MemoryStore {
            symbols: universe(),
            ..Default::default()
        });
        let source = Arc::new(StubSource::slow(Duration::from_secs(10)));
        let scheduler = scheduler(store, source.clone(), open_time())
            .with_tick_interval(Duration::from_secs(5));

        assert!(scheduler.start());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.in_flight.load(Ordering::SeqCst), 1);

        assert!(scheduler.stop());
        assert!(!scheduler.is_running());
        assert!(scheduler.start());
        assert!(!scheduler.start());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(source.calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(source.peak_in_flight.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_aborted_cycle_reports_cancelled() {
        let store = Arc::new(MemoryStore {
            symbols: universe(),
            ..Default::default()
        });
        let scheduler = scheduler(store.clone(), Arc::new(StubSource::default()), open_time());
        let abort = CancellationToken::new();
        abort.cancel();

        let err = scheduler.cycle.run(true, &abort).await.unwrap_err();
        assert!(matches!(err, StockError::Cancelled(_)));
        assert!(store.prices.lock().unwrap().is_empty());
    }
}
