//! Symbol and price snapshot persistence.
//!
//! [`SymbolStore`] is the seam the sync scheduler writes through; the SQLite
//! implementation keeps exactly one snapshot row per symbol.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::database::SharedDatabase;
use crate::clock::SharedClock;
use crate::types::{PriceSnapshot, Result, ResultExt, StockError, Symbol, Venue};

/// Storage collaborator used by the price sync scheduler
pub trait SymbolStore: Send + Sync {
    /// Active symbols ordered by code, at most `limit`
    fn active_symbols(&self, limit: usize) -> Result<Vec<Symbol>>;

    /// Replace the current snapshot for `snapshot.code`
    fn upsert_price(&self, snapshot: &PriceSnapshot) -> Result<()>;
}

pub struct SqlitePriceStore {
    db: SharedDatabase,
    clock: SharedClock,
}

impl SqlitePriceStore {
    pub fn new(db: SharedDatabase, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    pub fn upsert_symbol(&self, symbol: &Symbol) -> Result<()> {
        let now = self.clock.now().to_rfc3339();
        self.db
            .connection()?
            .execute(
                "INSERT INTO symbols (code, name, category, venue, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(code) DO UPDATE SET
                    name = excluded.name,
                    category = excluded.category,
                    venue = excluded.venue,
                    active = excluded.active,
                    updated_at = excluded.updated_at",
                params![
                    symbol.code,
                    symbol.name,
                    symbol.category,
                    venue_tag(symbol.venue),
                    symbol.active,
                    now,
                ],
            )
            .with_context_fn(|| format!("Failed to upsert symbol {}", symbol.code))?;
        Ok(())
    }

    /// Every symbol, active or not, ordered by code
    pub fn list_symbols(&self) -> Result<Vec<Symbol>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT code, name, category, venue, active FROM symbols ORDER BY code",
        )?;
        let rows = stmt.query_map([], map_symbol)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StockError::from)
    }

    pub fn latest_price(&self, code: &str) -> Result<Option<PriceSnapshot>> {
        let conn = self.db.connection()?;
        let row = conn
            .query_row(
                "SELECT code, price, open, high, low, prev_close, volume, amount,
                        change, change_percent, observed_at
                 FROM price_snapshots WHERE code = ?1",
                params![code],
                map_snapshot_row,
            )
            .optional()?;

        row.map(|(snapshot, observed_at)| {
            let observed_at = DateTime::parse_from_rfc3339(&observed_at)
                .with_context_fn(|| format!("Invalid observed_at for {}", code))?
                .with_timezone(&Utc);
            Ok::<_, StockError>(PriceSnapshot {
                observed_at,
                ..snapshot
            })
        })
        .transpose()
    }

    pub fn count_snapshots(&self) -> Result<usize> {
        let count: i64 = self.db.connection()?.query_row(
            "SELECT COUNT(*) FROM price_snapshots",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl SymbolStore for SqlitePriceStore {
    fn active_symbols(&self, limit: usize) -> Result<Vec<Symbol>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT code, name, category, venue, active FROM symbols
             WHERE active = 1 ORDER BY code LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], map_symbol)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StockError::from)
    }

    fn upsert_price(&self, snapshot: &PriceSnapshot) -> Result<()> {
        if !snapshot.is_persistable() {
            return Err(StockError::Storage(format!(
                "Refusing to store non-positive price for {}",
                snapshot.code
            )));
        }

        self.db
            .connection()?
            .execute(
                "INSERT INTO price_snapshots
                    (code, price, open, high, low, prev_close, volume, amount,
                     change, change_percent, observed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(code) DO UPDATE SET
                    price = excluded.price,
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    prev_close = excluded.prev_close,
                    volume = excluded.volume,
                    amount = excluded.amount,
                    change = excluded.change,
                    change_percent = excluded.change_percent,
                    observed_at = excluded.observed_at",
                params![
                    snapshot.code,
                    snapshot.price,
                    snapshot.open,
                    snapshot.high,
                    snapshot.low,
                    snapshot.prev_close,
                    snapshot.volume,
                    snapshot.amount,
                    snapshot.change,
                    snapshot.change_percent,
                    snapshot.observed_at.to_rfc3339(),
                ],
            )
            .with_context_fn(|| format!("Failed to store price for {}", snapshot.code))?;
        Ok(())
    }
}

fn venue_tag(venue: Venue) -> &'static str {
    match venue {
        Venue::Listed => "listed",
        Venue::OverTheCounter => "overthecounter",
    }
}

fn map_symbol(row: &Row<'_>) -> rusqlite::Result<Symbol> {
    let venue: String = row.get(3)?;
    Ok(Symbol {
        code: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        venue: venue.parse().unwrap_or_default(),
        active: row.get(4)?,
    })
}

/// Snapshot plus its raw timestamp, parsed by the caller
fn map_snapshot_row(row: &Row<'_>) -> rusqlite::Result<(PriceSnapshot, String)> {
    Ok((
        PriceSnapshot {
            code: row.get(0)?,
            price: row.get(1)?,
            open: row.get(2)?,
            high: row.get(3)?,
            low: row.get(4)?,
            prev_close: row.get(5)?,
            volume: row.get(6)?,
            amount: row.get(7)?,
            change: row.get(8)?,
            change_percent: row.get(9)?,
            observed_at: DateTime::<Utc>::MIN_UTC,
        },
        row.get(10)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};
    use crate::storage::Database;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn store() -> SqlitePriceStore {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        SqlitePriceStore::new(Arc::new(db), SystemClock::shared())
    }

    fn snapshot(code: &str, price: f64) -> PriceSnapshot {
        PriceSnapshot {
            code: code.to_string(),
            price,
            open: 570.0,
            high: 585.0,
            low: 568.0,
            prev_close: 575.0,
            volume: 25_000,
            amount: 1.4e10,
            change: price - 575.0,
            change_percent: (price - 575.0) / 575.0 * 100.0,
            observed_at: Utc.with_ymd_and_hms(2024, 3, 4, 2, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_active_symbols_filters_and_limits() {
        let store = store();
        store.upsert_symbol(&Symbol::new("2330", "TSMC")).unwrap();
        store.upsert_symbol(&Symbol::new("2317", "Hon Hai")).unwrap();
        store.upsert_symbol(&Symbol::new("6488", "GlobalWafers")).unwrap();
        store
            .upsert_symbol(&Symbol::new("1101", "Taiwan Cement").inactive())
            .unwrap();

        let active = store.active_symbols(10).unwrap();
        let codes: Vec<_> = active.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["2317", "2330", "6488"]);

        assert_eq!(store.active_symbols(2).unwrap().len(), 2);
        assert_eq!(store.list_symbols().unwrap().len(), 4);
    }

    #[test]
    fn test_upsert_price_replaces() {
        let store = store();
        store.upsert_symbol(&Symbol::new("2330", "TSMC")).unwrap();

        store.upsert_price(&snapshot("2330", 580.0)).unwrap();
        store.upsert_price(&snapshot("2330", 590.0)).unwrap();

        assert_eq!(store.count_snapshots().unwrap(), 1);
        let latest = store.latest_price("2330").unwrap().unwrap();
        assert_eq!(latest.price, 590.0);
        assert_eq!(latest.observed_at, snapshot("2330", 0.0).observed_at);
    }

    #[test]
    fn test_upsert_price_rejects_zero() {
        let store = store();
        store.upsert_symbol(&Symbol::new("2330", "TSMC")).unwrap();
        assert!(store.upsert_price(&snapshot("2330", 0.0)).is_err());
        assert!(store.latest_price("2330").unwrap().is_none());
    }

    #[test]
    fn test_upsert_price_for_unknown_symbol_fails() {
        let store = store();
        assert!(store.upsert_price(&snapshot("9999", 10.0)).is_err());
    }

    #[test]
    fn test_symbol_timestamps_follow_injected_clock() {
        let added = Utc.with_ymd_and_hms(2024, 3, 4, 1, 0, 0).unwrap();
        let clock = ManualClock::shared(added);
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        let store = SqlitePriceStore::new(Arc::new(db), clock.clone());

        store.upsert_symbol(&Symbol::new("2330", "TSMC")).unwrap();
        clock.advance(chrono::Duration::days(2));
        store
            .upsert_symbol(&Symbol::new("2330", "TSMC").inactive())
            .unwrap();

        let (created, updated): (String, String) = store
            .db
            .connection()
            .unwrap()
            .query_row(
                "SELECT created_at, updated_at FROM symbols WHERE code = '2330'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(created, added.to_rfc3339());
        assert_eq!(updated, (added + chrono::Duration::days(2)).to_rfc3339());
    }

    #[test]
    fn test_symbol_update_preserves_code() {
        let store = store();
        store.upsert_symbol(&Symbol::new("6488", "Old")).unwrap();
        store
            .upsert_symbol(&Symbol::new("6488", "GlobalWafers").with_category("Semiconductors"))
            .unwrap();
        let symbols = store.list_symbols().unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "GlobalWafers");
        assert_eq!(symbols[0].venue, Venue::Listed);
    }
}
