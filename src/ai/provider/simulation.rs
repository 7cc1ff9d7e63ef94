//! Simulation Provider
//!
//! Local canned replies used when every remote backend is unavailable.
//! Never fails and never exhausts.

use async_trait::async_trait;
use chrono_tz::Tz;
use rand::Rng;

use super::{AiProvider, ConversationContext, ProviderResult};
use crate::ai::usage::{ProviderUsage, UsageTracker};
use crate::clock::SharedClock;
use crate::config::ProviderKind;
use crate::constants::ai::SIMULATION_DAILY_LIMIT;

const PROVIDER: &str = "simulation";

/// Keyword groups checked in order; the first group with a hit wins.
/// Latin keywords match whole words, CJK keywords match anywhere.
const TOPICS: &[(&[&str], &[&str])] = &[
    (
        &["你好", "hello", "hi", "hey"],
        &[
            "Hello! I'm the StockPulse assistant. How can I help you today?",
            "Hi there! Ask me about a stock, the market session or your watchlist.",
            "Welcome back! What would you like to look at today?",
        ],
    ),
    (
        &["產品", "product", "products"],
        &[
            "We track listed and OTC securities. Tell me a code and I'll pull it up.",
            "Our coverage includes equities, ETFs and the major market indices.",
            "You can follow anything from blue chips to small OTC names here.",
        ],
    ),
    (
        &["優惠", "promotion", "promotions", "discount", "discounts"],
        &[
            "Registered members get a higher daily question allowance.",
            "Sign in to unlock more questions per day.",
            "Members enjoy extended usage limits. Registration is free.",
        ],
    ),
    (
        &["配送", "delivery", "deliver"],
        &[
            "Quotes refresh every few seconds while the market is open.",
            "Prices are delivered continuously during the trading session.",
            "Outside trading hours you'll see the last close until the next session.",
        ],
    ),
    (
        &["退換", "return", "returns", "refund", "refunds"],
        &[
            "Past performance does not guarantee future returns.",
            "Returns depend on your horizon and risk tolerance. Please invest carefully.",
            "Consider diversification to smooth out returns over time.",
        ],
    ),
    (
        &["推薦", "recommend", "recommendation", "suggest", "suggestion"],
        &[
            "I can't give personalised advice, but I can summarise any stock you name.",
            "Try comparing a few names in the same sector before deciding.",
            "Start with the index to see the overall trend, then drill into sectors.",
        ],
    ),
];

const DEFAULT_REPLIES: &[&str] = &[
    "Thanks for your question! I'm the StockPulse assistant and happy to help.",
    "I'm here to help with quotes, sessions and market questions.",
    "Glad to assist. Tell me which stock you're interested in.",
    "I'm the StockPulse assistant. Ask me about any listed or OTC symbol.",
    "Welcome to StockPulse! What can I look up for you?",
];

pub struct SimulationProvider {
    usage: UsageTracker,
}

impl SimulationProvider {
    pub fn new(day_tz: Tz, clock: SharedClock) -> Self {
        Self {
            usage: UsageTracker::unlimited(PROVIDER, SIMULATION_DAILY_LIMIT, day_tz, clock),
        }
    }

    /// Pick a reply for the message
    pub fn reply_for(message: &str) -> &'static str {
        let lowered = message.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let hit = |keyword: &&str| {
            if keyword.is_ascii() {
                words.contains(keyword)
            } else {
                lowered.contains(*keyword)
            }
        };

        let replies = TOPICS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(&hit))
            .map(|(_, replies)| *replies)
            .unwrap_or(DEFAULT_REPLIES);
        replies[rand::rng().random_range(0..replies.len())]
    }
}

#[async_trait]
impl AiProvider for SimulationProvider {
    async fn generate(&self, prompt: &str, _context: &ConversationContext) -> ProviderResult<String> {
        self.usage.record_success();
        Ok(Self::reply_for(prompt).to_string())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Simulation
    }

    fn name(&self) -> &str {
        "Simulation Service"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn usage_stats(&self) -> ProviderUsage {
        self.usage.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn test_greeting_matches_whole_word() {
        for prompt in ["hi", "Hi!", "oh hi", "你好hi"] {
            let reply = SimulationProvider::reply_for(prompt);
            assert!(TOPICS[0].1.contains(&reply), "{prompt:?} should greet");
        }
        for prompt in ["history of this stock", "which is higher"] {
            let reply = SimulationProvider::reply_for(prompt);
            assert!(DEFAULT_REPLIES.contains(&reply), "{prompt:?} should not greet");
        }
    }

    #[test]
    fn test_keyword_reply() {
        for _ in 0..20 {
            let reply = SimulationProvider::reply_for("你好，請問今天大盤如何");
            assert!(TOPICS[0].1.contains(&reply));
        }
        let reply = SimulationProvider::reply_for("Can you RECOMMEND something?");
        assert!(TOPICS[5].1.contains(&reply));
    }

    #[test]
    fn test_default_reply() {
        let reply = SimulationProvider::reply_for("xyz");
        assert!(DEFAULT_REPLIES.contains(&reply));
    }

    #[tokio::test]
    async fn test_always_available_and_counts_usage() {
        let provider = SimulationProvider::new(chrono_tz::Asia::Taipei, SystemClock::shared());
        for _ in 0..3 {
            let text = provider
                .generate("anything", &ConversationContext::default())
                .await
                .unwrap();
            assert!(!text.is_empty());
        }
        assert!(provider.is_available());
        let usage = provider.usage_stats();
        assert_eq!(usage.daily_count, 3);
        assert!(!usage.exhausted);
    }
}
