//! Run Command
//!
//! Long-running mode: the price sync scheduler and the rate governor sweep
//! run until Ctrl-C.

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::governor::GovernorSweeper;
use crate::types::Result;

pub async fn run() -> Result<()> {
    let ctx = CommandContext::load()?;
    let output = Output::new();

    let scheduler = ctx.scheduler()?;
    let governor = ctx.governor()?;
    let cancel = CancellationToken::new();
    let sweeper = GovernorSweeper::new(governor, ctx.config.rate_limit.sweep_interval())
        .start(cancel.clone());

    if ctx.config.scheduler.enabled {
        scheduler.start();
        output.success(&format!(
            "Price sync running every {}s",
            ctx.config.scheduler.tick_interval_secs
        ));
    } else {
        output.info("Price sync disabled by configuration");
    }
    output.info("Press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    scheduler.shutdown().await;
    cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Sweeper ended abnormally");
    }

    output.success("Stopped");
    Ok(())
}
