use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use continuity_core::config::TopicTrackingConfig;

use crate::error::{ContextError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRecord {
    pub mentions: usize,
    pub first_seen: usize,
    pub last_seen: usize,
    pub last_timestamp: DateTime<Utc>,
}

/// Sliding-window mention tracker over topic tokens extracted from turn text.
pub struct TopicTracker {
    config: TopicTrackingConfig,
    custom_patterns: Vec<Regex>,
    topics: HashMap<String, TopicRecord>,
    exchange_counter: usize,
}

impl TopicTracker {
    /// A malformed `custom_patterns` entry is a configuration error, not
    /// something to silently drop.
    pub fn new(config: TopicTrackingConfig) -> Result<Self> {
        let custom_patterns = config
            .custom_patterns
            .iter()
            .map(|p| {
                regex::RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ContextError::InvalidConfig(format!("bad topic_tracking.custom_patterns entry {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { config, custom_patterns, topics: HashMap::new(), exchange_counter: 0 })
    }

    pub fn topics(&self) -> &HashMap<String, TopicRecord> {
        &self.topics
    }

    /// Advance the exchange counter (or set it explicitly), prune topics
    /// that fell out of the window, and fold in tokens from `text`.
    pub fn track(&mut self, text: &str, exchange_index: Option<usize>) {
        self.exchange_counter = exchange_index.unwrap_or(self.exchange_counter + 1);
        self.prune();

        let current = self.exchange_counter;
        let extracted = self.extract_topics(text);

        let mut per_message_counts: HashMap<String, usize> = HashMap::new();
        for token in &extracted.tokenized {
            *per_message_counts.entry(token.clone()).or_default() += 1;
        }

        let mut topics_this_turn: Vec<String> = extracted.regex_matches.clone();
        for (token, count) in &per_message_counts {
            if *count >= 2 {
                topics_this_turn.push(token.clone());
            }
        }
        for token in per_message_counts.keys() {
            if self.topics.contains_key(token) {
                topics_this_turn.push(token.clone());
            }
        }
        topics_this_turn.sort();
        topics_this_turn.dedup();

        for topic in topics_this_turn {
            let entry = self.topics.entry(topic).or_insert_with(|| TopicRecord {
                mentions: 0,
                first_seen: current,
                last_seen: current,
                last_timestamp: Utc::now(),
            });
            entry.mentions += 1;
            entry.last_seen = current;
            entry.last_timestamp = Utc::now();
        }
    }

    fn prune(&mut self) {
        let current = self.exchange_counter;
        let window = self.config.window_size;
        self.topics.retain(|_, record| current.saturating_sub(record.last_seen) <= window);
    }

    /// `max(0, 1 - (mentions / fixationThreshold) * decayFactor)`.
    pub fn freshness(&self, mentions: usize) -> f64 {
        let ratio = mentions as f64 / self.config.fixation_threshold as f64;
        (1.0 - ratio * self.config.decay_factor).max(0.0)
    }

    pub fn is_fixated(&self, mentions: usize) -> bool {
        mentions >= self.config.fixation_threshold
    }

    pub fn fixated_topics(&self) -> Vec<(&String, &TopicRecord)> {
        self.topics.iter().filter(|(_, r)| self.is_fixated(r.mentions)).collect()
    }

    /// `[TOPIC NOTE] The topic 'X' has come up N times recently.` per
    /// fixated topic.
    pub fn format_notes(&self) -> String {
        let mut fixated = self.fixated_topics();
        fixated.sort_by_key(|(name, _)| (*name).clone());
        fixated
            .into_iter()
            .map(|(name, record)| {
                format!("[TOPIC NOTE] The topic '{name}' has come up {} times recently.", record.mentions)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

struct ExtractedTopics {
    regex_matches: Vec<String>,
    tokenized: Vec<String>,
}

impl TopicTracker {
    fn extract_topics(&self, text: &str) -> ExtractedTopics {
        let mut regex_matches = Vec::new();
        for pattern in &self.custom_patterns {
            for m in pattern.find_iter(text) {
                regex_matches.push(m.as_str().to_lowercase());
            }
        }

        let tokenized = text
            .split_whitespace()
            .map(|raw| {
                let lower = raw.to_lowercase();
                lower.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-').collect::<String>()
            })
            .filter(|token| {
                token.len() >= self.config.min_word_length
                    && token.chars().next().is_some_and(|c| c.is_alphabetic())
                    && !self.config.stop_words.iter().any(|sw| sw == token)
            })
            .collect();

        ExtractedTopics { regex_matches, tokenized }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixation_after_three_mentions() {
        let mut cfg = TopicTrackingConfig::default();
        cfg.window_size = 6;
        cfg.fixation_threshold = 3;
        cfg.decay_factor = 0.5;
        let mut tracker = TopicTracker::new(cfg).unwrap();

        for _ in 0..3 {
            tracker.track("identity identity", None);
        }

        let fixated = tracker.fixated_topics();
        assert!(fixated.iter().any(|(name, _)| name.as_str() == "identity"));
        let (_, record) = fixated.iter().find(|(name, _)| name.as_str() == "identity").unwrap();
        assert!(record.mentions >= 3);
        // 1 - (3/3)*0.5 = 0.5 per the freshness formula.
        assert_eq!(tracker.freshness(record.mentions), 0.5);
    }

    #[test]
    fn short_tokens_and_stop_words_are_excluded() {
        let tracker = TopicTracker::new(TopicTrackingConfig::default()).unwrap();
        let extracted = tracker.extract_topics("the cat sat on a mat sourdough sourdough");
        assert!(!extracted.tokenized.contains(&"the".to_string()));
        assert!(extracted.tokenized.contains(&"sourdough".to_string()));
    }

    #[test]
    fn rejects_malformed_custom_pattern() {
        let mut cfg = TopicTrackingConfig::default();
        cfg.custom_patterns = vec!["(unterminated".to_string()];
        assert!(TopicTracker::new(cfg).is_err());
    }

    #[test]
    fn format_notes_lists_fixated_topics() {
        let mut cfg = TopicTrackingConfig::default();
        cfg.fixation_threshold = 1;
        let mut tracker = TopicTracker::new(cfg).unwrap();
        tracker.track("bread bread", None);
        let notes = tracker.format_notes();
        assert!(notes.contains("[TOPIC NOTE]"));
        assert!(notes.contains("bread"));
    }
}
