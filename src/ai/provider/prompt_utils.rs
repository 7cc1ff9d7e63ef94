//! Prompt building utilities for AI providers.
//!
//! Every backend sends the same final prompt text, so the stock summary
//! prefix is assembled here once.

use super::{ConversationContext, StockContext};

/// One-line summary of the stock under discussion.
///
/// Fields that are absent (or a non-positive price) are left out.
pub fn stock_summary(stock: &StockContext) -> String {
    let mut summary = stock.code.clone();
    if let Some(name) = stock.name.as_deref().filter(|n| !n.is_empty()) {
        summary.push_str(&format!(" ({})", name));
    }
    if let Some(price) = stock.current_price.filter(|p| *p > 0.0) {
        summary.push_str(&format!(" price: {:.2}", price));
    }
    if let Some(change) = stock.change {
        summary.push_str(&format!(" change: {:+.2}", change));
    }
    if let Some(market) = stock.market.as_deref().filter(|m| !m.is_empty()) {
        summary.push_str(&format!(" [{}]", market));
    }
    summary
}

/// Final prompt sent upstream.
///
/// Returns the original prompt when the context carries no stock.
pub fn build_prompt(user_prompt: &str, context: &ConversationContext) -> String {
    match &context.stock {
        Some(stock) if !stock.code.trim().is_empty() => {
            format!("Stock: {}\nQuestion: {}", stock_summary(stock), user_prompt)
        }
        _ => user_prompt.to_string(),
    }
}
