//! End-to-end price sync: SQLite store, batch fetcher, scripted quote source.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use stockpulse::config::QuoteConfig;
use stockpulse::market::RawQuote;
use stockpulse::{
    Database, ManualClock, PriceSyncScheduler, QuoteBatchFetcher, QuoteSource, Result,
    SqlitePriceStore, SyncOutcome, Symbol, TradingSession,
};

/// Answers every channel with `price`, except codes listed in `untraded`
struct ScriptedSource {
    price: Mutex<&'static str>,
    untraded: Vec<&'static str>,
    batches: Mutex<Vec<usize>>,
}

impl ScriptedSource {
    fn new(untraded: Vec<&'static str>) -> Self {
        Self {
            price: Mutex::new("580.5"),
            untraded,
            batches: Mutex::new(Vec::new()),
        }
    }

    fn set_price(&self, price: &'static str) {
        *self.price.lock().unwrap() = price;
    }
}

#[async_trait]
impl QuoteSource for ScriptedSource {
    async fn fetch_channels(&self, channels: &[String]) -> Result<Vec<RawQuote>> {
        self.batches.lock().unwrap().push(channels.len());
        let price = *self.price.lock().unwrap();

        Ok(channels
            .iter()
            .map(|channel| {
                let code = channel
                    .trim_start_matches("tse_")
                    .trim_start_matches("otc_")
                    .trim_end_matches(".tw")
                    .to_string();
                let z = if self.untraded.contains(&code.as_str()) {
                    "--"
                } else {
                    price
                };
                RawQuote {
                    name: format!("Stock {}", code),
                    code,
                    price: z.to_string(),
                    prev_close: "575.0".to_string(),
                    volume: "1200".to_string(),
                    ..Default::default()
                }
            })
            .collect())
    }
}

struct Fixture {
    _dir: TempDir,
    store: Arc<SqlitePriceStore>,
    source: Arc<ScriptedSource>,
    scheduler: PriceSyncScheduler,
}

fn fixture(symbols: usize, untraded: Vec<&'static str>, at: DateTime<Utc>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("prices.db")).unwrap();
    db.initialize().unwrap();
    let clock = ManualClock::shared(at);
    let store = Arc::new(SqlitePriceStore::new(Arc::new(db), clock.clone()));
    for i in 0..symbols {
        let code = format!("{}", 2300 + i);
        store.upsert_symbol(&Symbol::new(code, "Test")).unwrap();
    }

    let source = Arc::new(ScriptedSource::new(untraded));
    let fetcher = QuoteBatchFetcher::new(source.clone(), &QuoteConfig::default(), clock.clone());
    let scheduler =
        PriceSyncScheduler::new(store.clone(), fetcher, TradingSession::default(), clock);

    Fixture {
        _dir: dir,
        store,
        source,
        scheduler,
    }
}

/// Monday 11:00 Taipei
fn in_session() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 3, 0, 0).unwrap()
}

/// Monday 18:00 Taipei
fn after_close() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_forty_five_symbols_sync_in_three_batches() {
    let f = fixture(45, vec!["2301"], in_session());

    let SyncOutcome::Completed(report) = f.scheduler.sync_once(false).await.unwrap() else {
        panic!("market should be open");
    };

    assert_eq!(*f.source.batches.lock().unwrap(), vec![20, 20, 5]);
    assert_eq!(report.symbols, 45);
    assert_eq!(report.fetched, 45);
    assert_eq!(report.written, 44);
    assert_eq!(report.discarded, 1);
    assert_eq!(f.store.count_snapshots().unwrap(), 44);

    assert!(f.store.latest_price("2301").unwrap().is_none());
    let tsmc = f.store.latest_price("2300").unwrap().unwrap();
    assert_eq!(tsmc.price, 580.5);
    assert!((tsmc.change - 5.5).abs() < 1e-9);
    assert!((tsmc.change_percent - 0.956_521_739).abs() < 1e-6);
    assert_eq!(tsmc.volume, 1200);
    assert_eq!(tsmc.observed_at, in_session());
}

#[tokio::test(start_paused = true)]
async fn test_second_sync_replaces_rather_than_appends() {
    let f = fixture(3, vec![], in_session());
    f.scheduler.sync_once(false).await.unwrap();

    f.source.set_price("590.0");
    f.scheduler.sync_once(false).await.unwrap();

    assert_eq!(f.store.count_snapshots().unwrap(), 3);
    assert_eq!(f.store.latest_price("2302").unwrap().unwrap().price, 590.0);
}

#[tokio::test(start_paused = true)]
async fn test_after_close_only_force_syncs() {
    let f = fixture(3, vec![], after_close());

    assert_eq!(f.scheduler.sync_once(false).await.unwrap(), SyncOutcome::Skipped);
    assert!(f.source.batches.lock().unwrap().is_empty());

    let report = f.scheduler.force_sync_now().await.unwrap();
    assert_eq!(report.written, 3);
    assert_eq!(f.store.count_snapshots().unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_running_scheduler_skips_every_tick_when_closed() {
    let f = fixture(3, vec![], after_close());
    let scheduler = f.scheduler.with_tick_interval(Duration::from_secs(5));

    assert!(scheduler.start());
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(f.source.batches.lock().unwrap().is_empty());

    scheduler.shutdown().await;
    assert!(!scheduler.is_running());
    assert_eq!(f.store.count_snapshots().unwrap(), 0);
}
