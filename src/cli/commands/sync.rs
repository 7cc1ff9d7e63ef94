//! Sync Command
//!
//! Run a single price sync cycle in the foreground.
//!
//! Usage:
//!   stockpulse sync            # respects trading hours
//!   stockpulse sync --force    # operator refresh outside the session

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::market::SyncOutcome;
use crate::types::Result;

pub async fn run(force: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let scheduler = ctx.scheduler()?;
    let output = Output::new();

    match scheduler.sync_once(force).await? {
        SyncOutcome::Skipped => {
            output.info("Market is closed; nothing synced. Use --force to sync anyway.");
        }
        SyncOutcome::Completed(report) => {
            if report.symbols == 0 {
                output.warning("No active symbols. Add some with 'stockpulse symbols add'.");
                return Ok(());
            }

            output.success(&format!(
                "Synced {} of {} symbols",
                report.written, report.symbols
            ));
            output.field("Fetched", report.fetched);
            output.field("No trade", report.discarded);
            if report.failed_chunks > 0 {
                output.warning(&format!("{} quote batches failed", report.failed_chunks));
            }
            if report.failed_writes > 0 {
                output.warning(&format!("{} prices could not be stored", report.failed_writes));
            }
        }
    }
    Ok(())
}
