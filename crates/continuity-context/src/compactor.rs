use continuity_core::config::{CompactionConfig, ContextBudgetConfig};
use continuity_core::{Message, Role, TokenEstimator};

use crate::anchors::ContinuityAnchors;
use crate::budget::ContextBudgetAllocator;
use crate::error::Result;

fn is_tool_like(message: &Message) -> bool {
    matches!(message.role, Role::Tool)
        || message.tool_name.is_some()
        || message.tool_params.is_some()
}

/// Shrinks an over-budget message list back under the token ceiling using
/// one of two strategies, with a fixed fallback if both still overshoot.
pub struct Compactor {
    config: CompactionConfig,
    budget_config: ContextBudgetConfig,
    allocator: ContextBudgetAllocator,
}

impl Compactor {
    pub fn new(config: CompactionConfig, budget_config: ContextBudgetConfig) -> Result<Self> {
        let allocator = ContextBudgetAllocator::new(budget_config.clone())?;
        Ok(Self { config, budget_config, allocator })
    }

    pub fn should_compact(&self, messages: &[Message], estimator: &TokenEstimator) -> bool {
        let total = estimator.estimate_messages(messages);
        total as f64 > self.config.threshold * estimator.max_tokens() as f64
    }

    pub fn compact(&self, messages: &[Message], estimator: &TokenEstimator) -> Vec<Message> {
        let is_task_aware = self.config.task_aware_compaction && messages.iter().any(is_tool_like);

        let mut result = if is_task_aware {
            self.compact_task_aware(messages, estimator)
        } else {
            self.compact_conversational(messages, estimator)
        };

        if estimator.is_over_budget(estimator.estimate_messages(&result), 0.95) {
            result = self.fallback(messages);
        }
        result
    }

    fn compact_task_aware(&self, messages: &[Message], estimator: &TokenEstimator) -> Vec<Message> {
        let max_tokens = estimator.max_tokens() as f64;
        let budget = (max_tokens * self.budget_config.budget_ratio).floor() as usize;

        let mut kept: Vec<(usize, Message)> = Vec::new();
        let mut used = 0usize;

        if let Some((i, m)) = messages.iter().enumerate().find(|(_, m)| matches!(m.role, Role::System)) {
            used += estimator.estimate(&m.text());
            kept.push((i, m.clone()));
        }
        if let Some((i, m)) = messages.iter().enumerate().find(|(_, m)| matches!(m.role, Role::User)) {
            if !kept.iter().any(|(ki, _)| *ki == i) {
                used += estimator.estimate(&m.text());
                kept.push((i, m.clone()));
            }
        }

        let tool_budget = (budget as f64 * 0.7) as usize;
        for (i, m) in messages.iter().enumerate().rev().filter(|(_, m)| is_tool_like(m)).take(15) {
            let tokens = estimator.estimate(&m.text());
            if used + tokens >= tool_budget {
                break;
            }
            used += tokens;
            kept.push((i, m.clone()));
        }

        let assistant_budget = (budget as f64 * 0.9) as usize;
        for (i, m) in
            messages.iter().enumerate().rev().filter(|(_, m)| matches!(m.role, Role::Assistant)).take(5)
        {
            let truncated = truncate_chars(&m.text(), 1500);
            let tokens = estimator.estimate(&truncated);
            if used + tokens >= assistant_budget {
                break;
            }
            used += tokens;
            let mut msg = m.clone();
            msg.content = continuity_core::Content::Text(truncated);
            kept.push((i, msg));
        }

        for (i, m) in messages.iter().enumerate().rev().filter(|(_, m)| matches!(m.role, Role::User)).take(5) {
            let tokens = estimator.estimate(&m.text());
            if used + tokens >= budget {
                break;
            }
            used += tokens;
            kept.push((i, m.clone()));
        }

        kept.sort_by_key(|(i, _)| *i);
        kept.dedup_by_key(|(i, _)| *i);
        kept.into_iter().map(|(_, m)| m).collect()
    }

    fn compact_conversational(&self, messages: &[Message], estimator: &TokenEstimator) -> Vec<Message> {
        let (mut selected, _report) = self.allocator.select(messages, &[], estimator, estimator.max_tokens());

        let mut anchors = ContinuityAnchors::new(continuity_core::config::AnchorsConfig::default());
        anchors.detect(messages);
        let anchor_block = anchors.format();
        if anchor_block.is_empty() {
            return selected;
        }

        if let Some(system) = selected.iter_mut().find(|m| matches!(m.role, Role::System)) {
            let combined = format!("{}\n\n{}", system.text(), anchor_block);
            system.content = continuity_core::Content::Text(combined);
        } else {
            selected.insert(0, Message::new(Role::System, anchor_block));
        }
        selected
    }

    fn fallback(&self, messages: &[Message]) -> Vec<Message> {
        let mut out = Vec::new();
        if let Some(system) = messages.iter().find(|m| matches!(m.role, Role::System)) {
            out.push(system.clone());
        }
        let tail: Vec<Message> = messages
            .iter()
            .rev()
            .filter(|m| !matches!(m.role, Role::System))
            .take(self.config.fallback_messages)
            .cloned()
            .collect();
        out.extend(tail.into_iter().rev());
        out
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_compact_above_threshold() {
        let estimator = TokenEstimator::new(100);
        let compactor = Compactor::new(CompactionConfig::default(), ContextBudgetConfig::default()).unwrap();
        let messages: Vec<Message> = (0..50).map(|_| Message::new(Role::User, "padding word word word")).collect();
        assert!(compactor.should_compact(&messages, &estimator));
    }

    #[test]
    fn fallback_keeps_system_and_tail() {
        let compactor = Compactor::new(CompactionConfig::default(), ContextBudgetConfig::default()).unwrap();
        let mut messages = vec![Message::new(Role::System, "sys")];
        messages.extend((0..30).map(|i| Message::new(Role::User, format!("msg {i}"))));
        let out = compactor.fallback(&messages);
        assert_eq!(out[0].role, Role::System);
        assert_eq!(out.len(), 1 + compactor.config.fallback_messages);
    }

    #[test]
    fn task_aware_path_triggers_on_tool_message() {
        let estimator = TokenEstimator::new(8192);
        let compactor = Compactor::new(CompactionConfig::default(), ContextBudgetConfig::default()).unwrap();
        let mut messages = vec![Message::new(Role::System, "sys"), Message::new(Role::User, "first")];
        messages.push(Message::new(Role::Tool, "tool output"));
        let out = compactor.compact(&messages, &estimator);
        assert!(!out.is_empty());
    }
}
