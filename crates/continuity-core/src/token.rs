use crate::message::Message;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Per-message overhead added on top of the raw text estimate, approximating
/// role/formatting tokens a real tokenizer would also charge for.
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Pluggable token counter. Must return a nonnegative count; if a real
/// implementation panics or errors the caller falls back to the heuristic.
pub trait Tokenizer: Send + Sync {
    fn count(&self, text: &str) -> anyhow::Result<usize>;
}

/// `ceil(words * tokens_per_word + special_chars * special_char_weight)`.
///
/// Used whenever no tokenizer is configured, and as the fallback when a
/// configured one fails.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicConfig {
    pub tokens_per_word: f64,
    pub special_char_weight: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self { tokens_per_word: 1.3, special_char_weight: 0.5 }
    }
}

fn heuristic_estimate(text: &str, cfg: &HeuristicConfig) -> usize {
    let words = text.split_whitespace().count();
    let special_chars = text.chars().filter(|c| !c.is_alphanumeric() && !c.is_whitespace()).count();
    let raw = words as f64 * cfg.tokens_per_word + special_chars as f64 * cfg.special_char_weight;
    raw.ceil() as usize
}

/// Token budget tracker with an optional pluggable [`Tokenizer`].
pub struct TokenEstimator {
    heuristic: HeuristicConfig,
    tokenizer: Option<Box<dyn Tokenizer>>,
    max_tokens: AtomicUsize,
}

impl TokenEstimator {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            heuristic: HeuristicConfig::default(),
            tokenizer: None,
            max_tokens: AtomicUsize::new(max_tokens),
        }
    }

    pub fn with_heuristic(mut self, heuristic: HeuristicConfig) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Install a custom tokenizer. Accepted unconditionally here — failures
    /// surface per-call, not at registration time (§7: configuration errors
    /// are surfaced to the setter, not here, since a bad tokenizer only
    /// manifests once it is actually invoked).
    pub fn set_tokenizer(&mut self, tokenizer: Box<dyn Tokenizer>) {
        self.tokenizer = Some(tokenizer);
    }

    pub fn estimate(&self, text: &str) -> usize {
        if let Some(tok) = &self.tokenizer {
            match tok.count(text) {
                Ok(n) => return n,
                Err(e) => {
                    warn!(error = %e, "custom tokenizer failed, falling back to heuristic");
                }
            }
        }
        heuristic_estimate(text, &self.heuristic)
    }

    pub fn estimate_messages(&self, messages: &[Message]) -> usize {
        messages
            .iter()
            .map(|m| self.estimate(&m.text()) + MESSAGE_OVERHEAD_TOKENS)
            .sum()
    }

    pub fn set_max_tokens(&self, max_tokens: usize) {
        self.max_tokens.store(max_tokens, Ordering::Relaxed);
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens.load(Ordering::Relaxed)
    }

    /// Whether `count` exceeds `ratio` of the configured max.
    pub fn is_over_budget(&self, count: usize, ratio: f64) -> bool {
        count as f64 > self.max_tokens() as f64 * ratio
    }

    pub fn remaining(&self, used: usize) -> usize {
        self.max_tokens().saturating_sub(used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn heuristic_matches_default_weights() {
        let est = TokenEstimator::new(1000);
        // "hello world" -> 2 words, 0 special chars -> ceil(2*1.3) = 3
        assert_eq!(est.estimate("hello world"), 3);
    }

    #[test]
    fn special_chars_add_weight() {
        let est = TokenEstimator::new(1000);
        let plain = est.estimate("hello world");
        let punctuated = est.estimate("hello, world!");
        assert!(punctuated > plain);
    }

    #[test]
    fn estimate_messages_adds_overhead_per_message() {
        let est = TokenEstimator::new(1000);
        let msgs = vec![Message::new(Role::User, "hi"), Message::new(Role::Assistant, "hello")];
        let total: usize = msgs.iter().map(|m| est.estimate(&m.text())).sum();
        assert_eq!(est.estimate_messages(&msgs), total + 2 * MESSAGE_OVERHEAD_TOKENS);
    }

    #[test]
    fn over_budget_ratio() {
        let est = TokenEstimator::new(100);
        assert!(est.is_over_budget(81, 0.8));
        assert!(!est.is_over_budget(79, 0.8));
    }

    struct FailingTokenizer;
    impl Tokenizer for FailingTokenizer {
        fn count(&self, _text: &str) -> anyhow::Result<usize> {
            anyhow::bail!("boom")
        }
    }

    #[test]
    fn failing_custom_tokenizer_falls_back_to_heuristic() {
        let mut est = TokenEstimator::new(1000);
        est.set_tokenizer(Box::new(FailingTokenizer));
        assert_eq!(est.estimate("hello world"), 3);
    }
}
