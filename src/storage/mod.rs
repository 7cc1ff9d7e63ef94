//! Local persistence for the symbol universe and current prices.

pub mod database;
pub mod price_store;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use price_store::{SqlitePriceStore, SymbolStore};
