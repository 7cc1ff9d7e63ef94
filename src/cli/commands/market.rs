//! Market Command
//!
//! Report whether the venue is in session, optionally with index levels.
//!
//! Usage:
//!   stockpulse market
//!   stockpulse market --at 2024-03-04T09:00:00+08:00
//!   stockpulse market --indices

use crate::cli::ui::Output;
use crate::cli::util::{CommandContext, parse_timestamp, signed};
use crate::market::IndexKind;
use crate::types::Result;

pub async fn run(at: Option<String>, indices: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let session = ctx.session()?;
    let output = Output::new();

    let ts = match at.as_deref() {
        Some(raw) => parse_timestamp(raw)?,
        None => ctx.clock.now(),
    };
    let local = ts.with_timezone(&session.timezone);

    output.section("Trading Session");
    output.field("Venue time", local.format("%Y-%m-%d %a %H:%M:%S %Z"));
    output.field(
        "Session",
        format!(
            "{}-{}",
            session.open.format("%H:%M"),
            session.close.format("%H:%M")
        ),
    );
    if session.is_open(ts) {
        output.success("Market is open");
    } else {
        output.info("Market is closed");
    }

    if indices {
        let fetcher = ctx.fetcher()?;
        output.section("Indices");
        for kind in IndexKind::ALL {
            match fetcher.fetch_index(kind).await {
                Ok(quote) => {
                    let change = format!(
                        "{} ({}%)",
                        signed(quote.change),
                        signed(quote.change_percent)
                    );
                    output.field(
                        kind.label(),
                        format!("{:.2}  {}", quote.value, output.change(change, quote.change)),
                    );
                }
                Err(e) => output.error(&format!("{}: {}", kind.label(), e)),
            }
        }
    }
    Ok(())
}
