//! Status Command
//!
//! Provider configuration and usage, trading session, local data.

use serde_json::json;

use crate::ai::ProviderUsage;
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::storage::SymbolStore;
use crate::types::Result;

pub fn run(format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let gateway = ctx.gateway()?;
    let session = ctx.session()?;
    let store = ctx.store();

    let now = ctx.clock.now();
    let market_open = session.is_open(now);
    let symbols = store.list_symbols()?;
    let active = store.active_symbols(ctx.config.quotes.universe_cap)?.len();
    let snapshots = store.count_snapshots()?;

    let providers: Vec<(ProviderUsage, bool)> = gateway
        .service_stats()
        .into_iter()
        .map(|usage| {
            let available = usage
                .provider
                .parse()
                .ok()
                .and_then(|kind| gateway.provider(kind))
                .is_some_and(|p| p.is_available());
            (usage, available)
        })
        .collect();

    if format == "json" {
        let status = json!({
            "primary": gateway.primary(),
            "providers": providers
                .iter()
                .map(|(usage, available)| json!({ "usage": usage, "available": available }))
                .collect::<Vec<_>>(),
            "market": {
                "open": market_open,
                "timezone": session.timezone.name(),
            },
            "symbols": { "total": symbols.len(), "active": active },
            "snapshots": snapshots,
            "database": ctx.config.storage.database_path,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let output = Output::new();
    output.section("AI Providers");
    output.field("Primary", gateway.primary());
    for (usage, available) in &providers {
        let state = if *available { "available" } else { "unavailable" };
        output.field(
            &usage.provider,
            format!(
                "{} · {}/{} today ({:.1}%) · {} errors",
                state,
                usage.daily_count,
                usage.daily_limit,
                usage.usage_percentage(),
                usage.error_count
            ),
        );
    }

    output.section("Market");
    output.field("Timezone", session.timezone.name());
    output.field("Session", if market_open { "open" } else { "closed" });

    output.section("Data");
    output.field("Symbols", format!("{} ({} active)", symbols.len(), active));
    output.field("Snapshots", snapshots);
    output.field("Database", ctx.config.storage.database_path.display());
    Ok(())
}
