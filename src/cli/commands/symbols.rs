//! Symbols Command
//!
//! Maintain the symbol universe the price sync polls.
//!
//! Usage:
//!   stockpulse symbols add 2330 TSMC --category Semiconductors
//!   stockpulse symbols add 6488 GlobalWafers --venue otc
//!   stockpulse symbols list

use console::style;

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, signed};
use crate::types::{Result, Symbol, Venue};

pub struct AddOptions {
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub venue: Option<Venue>,
    pub inactive: bool,
}

pub fn add(options: AddOptions) -> Result<()> {
    let ctx = CommandContext::load()?;
    let store = ctx.store();

    let mut symbol = Symbol::new(options.code.trim(), options.name.trim());
    if let Some(category) = options.category {
        symbol = symbol.with_category(category);
    }
    if let Some(venue) = options.venue {
        symbol = symbol.with_venue(venue);
    }
    if options.inactive {
        symbol = symbol.inactive();
    }

    store.upsert_symbol(&symbol)?;
    Output::new().success(&format!(
        "Saved {} {} [{}]{}",
        symbol.code,
        symbol.name,
        symbol.venue,
        if symbol.active { "" } else { " (inactive)" }
    ));
    Ok(())
}

pub fn list(format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let store = ctx.store();
    let symbols = store.list_symbols()?;

    let mut rows = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let price = store.latest_price(&symbol.code)?;
        rows.push((symbol, price));
    }

    if format == "json" {
        let items: Vec<_> = rows
            .iter()
            .map(|(symbol, price)| serde_json::json!({ "symbol": symbol, "price": price }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let output = Output::new();
    if rows.is_empty() {
        output.info("No symbols yet. Add one with 'stockpulse symbols add <code> <name>'.");
        return Ok(());
    }

    output.section(&format!("Symbols ({})", rows.len()));
    for (symbol, price) in &rows {
        let quote = match price {
            Some(p) => format!(
                "{:>10.2} {}",
                p.price,
                output.change(format!("{:>8}", signed(p.change)), p.change)
            ),
            None => style(format!("{:>10}", "--")).dim().to_string(),
        };
        let code = if symbol.active {
            style(symbol.code.clone()).bold()
        } else {
            style(symbol.code.clone()).dim()
        };
        println!("  {:<8} {:<4} {:<20} {}", code, symbol.venue, symbol.name, quote);
    }
    Ok(())
}
