use serde::{Deserialize, Serialize};

use continuity_core::config::ContextBudgetConfig;
use continuity_core::{Message, Role, TokenEstimator};

use crate::error::{ContextError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Minimal,
    Low,
    Medium,
    High,
    Essential,
}

impl Tier {
    fn weight(self) -> f64 {
        match self {
            Tier::Essential => 1.0,
            Tier::High => 0.8,
            Tier::Medium => 0.6,
            Tier::Low => 0.4,
            Tier::Minimal => 0.2,
        }
    }

    /// Highest-priority tiers first.
    fn priority_order() -> [Tier; 5] {
        [Tier::Essential, Tier::High, Tier::Medium, Tier::Low, Tier::Minimal]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolReport {
    pub allocated: usize,
    pub used: usize,
    pub messages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetReport {
    pub ceiling: usize,
    pub total_budget: usize,
    pub total_used: usize,
    pub remaining: usize,
    pub essential: PoolReport,
    pub high: PoolReport,
    pub medium: PoolReport,
    pub low: PoolReport,
    pub minimal: PoolReport,
}

struct Classified<'a> {
    index: usize,
    message: &'a Message,
    tier: Tier,
}

/// Tiered, pool-based selector that fits a message list under a token
/// ceiling while favoring recent and explicitly high-priority entries.
pub struct ContextBudgetAllocator {
    config: ContextBudgetConfig,
}

impl ContextBudgetAllocator {
    /// Rejects a config whose `pool_ratios` do not sum to 1.0, independent
    /// of whatever validation the caller's own config loader already did.
    pub fn new(config: ContextBudgetConfig) -> Result<Self> {
        let r = &config.pool_ratios;
        let sum = r.essential + r.high + r.medium + r.low + r.minimal;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ContextError::InvalidConfig(format!("pool_ratios must sum to 1.0, got {sum}")));
        }
        Ok(Self { config })
    }

    fn classify(&self, index: usize, total: usize, message: &Message, high_priority: bool) -> Tier {
        if matches!(message.role, Role::System) {
            return Tier::Essential;
        }
        if high_priority {
            return Tier::High;
        }
        let d = total - 1 - index;
        let r = self.config.recent_turns_always_full;
        if d < 2 * r {
            Tier::Essential
        } else if d < 4 * r {
            Tier::Medium
        } else if d < 8 * r {
            Tier::Low
        } else {
            Tier::Minimal
        }
    }

    fn char_limit(&self, tier: Tier) -> usize {
        match tier {
            Tier::Essential | Tier::High => self.config.recent_turn_char_limit,
            Tier::Medium => self.config.mid_turn_char_limit,
            Tier::Low => self.config.older_turn_char_limit,
            Tier::Minimal => self.config.older_turn_char_limit / 2,
        }
    }

    /// `{essential, high, medium, low, minimal}` weighted by `weight()`, or
    /// any subset; tags given by the caller for out-of-band entries like
    /// anchor blocks that must land in the HIGH pool.
    pub fn select(
        &self,
        messages: &[Message],
        high_priority_indices: &[usize],
        estimator: &TokenEstimator,
        max_tokens: usize,
    ) -> (Vec<Message>, BudgetReport) {
        let ceiling = max_tokens;
        let total_budget = (ceiling as f64 * self.config.budget_ratio).floor() as usize;
        let pools = &self.config.pool_ratios;

        let pool_budget = |ratio: f64| (total_budget as f64 * ratio).floor() as usize;
        let mut essential_pool = PoolReport { allocated: pool_budget(pools.essential), ..Default::default() };
        let mut high_pool = PoolReport { allocated: pool_budget(pools.high), ..Default::default() };
        let mut medium_pool = PoolReport { allocated: pool_budget(pools.medium), ..Default::default() };
        let mut low_pool = PoolReport { allocated: pool_budget(pools.low), ..Default::default() };
        let mut minimal_pool = PoolReport { allocated: pool_budget(pools.minimal), ..Default::default() };

        let total = messages.len();
        let classified: Vec<Classified> = messages
            .iter()
            .enumerate()
            .map(|(i, m)| Classified { index: i, message: m, tier: self.classify(i, total, m, high_priority_indices.contains(&i)) })
            .collect();

        let mut admitted: Vec<(usize, Message)> = Vec::new();

        for tier in Tier::priority_order() {
            let pool = match tier {
                Tier::Essential => &mut essential_pool,
                Tier::High => &mut high_pool,
                Tier::Medium => &mut medium_pool,
                Tier::Low => &mut low_pool,
                Tier::Minimal => &mut minimal_pool,
            };

            for item in classified.iter().filter(|c| c.tier == tier) {
                let truncated_text = truncate_for_tier(&item.message.text(), self.char_limit(tier));
                let tokens = estimator.estimate(&truncated_text);
                if pool.used + tokens > pool.allocated {
                    continue;
                }
                pool.used += tokens;
                pool.messages += 1;
                let mut msg = item.message.clone();
                msg.content = continuity_core::Content::Text(truncated_text);
                admitted.push((item.index, msg));
            }
        }

        admitted.sort_by_key(|(index, _)| *index);
        let total_used =
            essential_pool.used + high_pool.used + medium_pool.used + low_pool.used + minimal_pool.used;

        let report = BudgetReport {
            ceiling,
            total_budget,
            total_used,
            remaining: total_budget.saturating_sub(total_used),
            essential: essential_pool,
            high: high_pool,
            medium: medium_pool,
            low: low_pool,
            minimal: minimal_pool,
        };

        (admitted.into_iter().map(|(_, m)| m).collect(), report)
    }
}

/// Truncate to `limit` chars, preferring to cut at the last sentence
/// boundary (`.` or `\n`) in the back half of the chunk.
fn truncate_for_tier(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let truncated: String = text.chars().take(limit).collect();
    let half = limit / 2;
    let boundary = truncated
        .char_indices()
        .skip(half)
        .filter(|(_, c)| *c == '.' || *c == '\n')
        .map(|(i, _)| i)
        .last();

    match boundary {
        Some(idx) => truncated[..=idx].to_string(),
        None => format!("{truncated} [...]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_msg(role: Role, text: &str) -> Message {
        Message::new(role, text)
    }

    #[test]
    fn recent_messages_get_essential_tier() {
        let allocator = ContextBudgetAllocator::new(ContextBudgetConfig::default()).unwrap();
        let tier = allocator.classify(9, 10, &text_msg(Role::User, "hi"), false);
        assert_eq!(tier, Tier::Essential);
    }

    #[test]
    fn older_messages_demote_to_minimal() {
        let allocator = ContextBudgetAllocator::new(ContextBudgetConfig::default()).unwrap();
        let tier = allocator.classify(0, 100, &text_msg(Role::User, "hi"), false);
        assert_eq!(tier, Tier::Minimal);
    }

    #[test]
    fn select_respects_pool_budget() {
        let allocator = ContextBudgetAllocator::new(ContextBudgetConfig::default()).unwrap();
        let estimator = TokenEstimator::new(8192);
        let messages: Vec<Message> =
            (0..200).map(|i| text_msg(Role::Assistant, &format!("message number {i} with some padding text"))).collect();
        let (selected, report) = allocator.select(&messages, &[], &estimator, 8192);
        assert!(!selected.is_empty());
        assert!(report.total_used <= report.total_budget + 50);
    }

    #[test]
    fn rejects_pool_ratios_not_summing_to_one() {
        let mut cfg = ContextBudgetConfig::default();
        cfg.pool_ratios.essential = 0.9;
        assert!(ContextBudgetAllocator::new(cfg).is_err());
    }

    #[test]
    fn truncate_prefers_sentence_boundary() {
        let text = "First sentence is short. Second sentence runs on and on and on and on.";
        let truncated = truncate_for_tier(text, 40);
        assert!(truncated.ends_with('.'));
    }
}
