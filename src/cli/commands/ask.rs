//! Ask Command
//!
//! Send one prompt through the AI gateway, optionally grounded on a stock.
//!
//! Usage:
//!   stockpulse ask "Is TSMC overbought?" --stock 2330

use console::style;

use crate::ai::{ConversationContext, StockContext};
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::storage::SqlitePriceStore;
use crate::types::Result;

pub struct AskOptions {
    pub prompt: String,
    pub conversation: Option<String>,
    pub stock: Option<String>,
}

pub async fn run(options: AskOptions) -> Result<()> {
    let ctx = CommandContext::load()?;
    let gateway = ctx.gateway()?;
    let output = Output::new();

    let conversation_id = options
        .conversation
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut conversation = ConversationContext::new(conversation_id);
    if let Some(code) = options.stock.as_deref() {
        conversation = conversation.with_stock(stock_context(&ctx.store(), code)?);
    }

    let reply = gateway.generate(&options.prompt, &conversation).await;

    println!("{}", reply.text);
    println!();
    println!(
        "{}",
        style(format!(
            "via {} · conversation {}",
            reply.provider, conversation.conversation_id
        ))
        .dim()
    );
    if reply.used_fallback() {
        for failure in &reply.failures {
            output.warning(&format!(
                "{} failed ({:?}): {}",
                failure.provider, failure.decision, failure.message
            ));
        }
    }
    Ok(())
}

/// Stock context from the local universe and last stored snapshot
fn stock_context(store: &SqlitePriceStore, code: &str) -> Result<StockContext> {
    let mut stock = StockContext::new(code);

    if let Some(symbol) = store.list_symbols()?.into_iter().find(|s| s.code == code) {
        stock.name = Some(symbol.name);
        stock.market = Some(symbol.venue.to_string());
    }
    if let Some(snapshot) = store.latest_price(code)? {
        stock.current_price = Some(snapshot.price);
        stock.change = Some(snapshot.change);
    }
    Ok(stock)
}
