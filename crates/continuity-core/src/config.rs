use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoreError, Result};

/// Top-level configuration (`continuity.toml` + `CONTINUITY_*` env overrides).
///
/// Every field has a default, so an absent config file is equivalent to
/// `ContinuityConfig::default()` — only env overrides are required to
/// customize a deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuityConfig {
    pub context_budget: ContextBudgetConfig,
    pub anchors: AnchorsConfig,
    pub topic_tracking: TopicTrackingConfig,
    pub compaction: CompactionConfig,
    pub token_estimation: TokenEstimationConfig,
    pub archive: ArchiveConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub continuity_indicators: Vec<String>,
    /// Deployment-specific knobs not covered by the structured config above,
    /// passed through verbatim for the host to read on its own.
    pub extra: ExtraConfig,
}

impl Default for ContinuityConfig {
    fn default() -> Self {
        Self {
            context_budget: ContextBudgetConfig::default(),
            anchors: AnchorsConfig::default(),
            topic_tracking: TopicTrackingConfig::default(),
            compaction: CompactionConfig::default(),
            token_estimation: TokenEstimationConfig::default(),
            archive: ArchiveConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
            continuity_indicators: default_continuity_indicators(),
            extra: ExtraConfig::default(),
        }
    }
}

impl ContinuityConfig {
    /// Load from a TOML file with `CONTINUITY_*` env var overrides.
    ///
    /// Checks the explicit path if given, else `./continuity.toml` — a
    /// missing file is not an error, it simply leaves every field defaulted.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or("continuity.toml");

        let config: ContinuityConfig = Figment::from(Serialized::defaults(ContinuityConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CONTINUITY_").split("_"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let r = &self.context_budget.pool_ratios;
        let sum = r.essential + r.high + r.medium + r.low + r.minimal;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(CoreError::Config(format!(
                "context_budget.pool_ratios must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolRatios {
    pub essential: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub minimal: f64,
}

impl Default for PoolRatios {
    fn default() -> Self {
        Self { essential: 0.30, high: 0.25, medium: 0.25, low: 0.15, minimal: 0.05 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextBudgetConfig {
    pub budget_ratio: f64,
    pub recent_turns_always_full: usize,
    pub recent_turn_char_limit: usize,
    pub mid_turn_char_limit: usize,
    pub older_turn_char_limit: usize,
    pub pool_ratios: PoolRatios,
}

impl Default for ContextBudgetConfig {
    fn default() -> Self {
        Self {
            budget_ratio: 0.65,
            recent_turns_always_full: 3,
            recent_turn_char_limit: 3000,
            mid_turn_char_limit: 1500,
            older_turn_char_limit: 500,
            pool_ratios: PoolRatios::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorKeywords {
    pub identity: Vec<String>,
    pub contradiction: Vec<String>,
    pub tension: Vec<String>,
}

impl Default for AnchorKeywords {
    fn default() -> Self {
        Self {
            identity: vec!["i am".into(), "i'm".into(), "my name is".into(), "call me".into()],
            contradiction: vec![
                "actually no".into(),
                "that's wrong".into(),
                "i changed my mind".into(),
                "not true anymore".into(),
            ],
            tension: vec!["frustrated".into(), "annoyed".into(), "upset".into(), "angry".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorsConfig {
    pub enabled: bool,
    pub max_age_secs: i64,
    pub max_count: usize,
    pub keywords: AnchorKeywords,
}

impl Default for AnchorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_secs: 60 * 60 * 24 * 14,
            max_count: 20,
            keywords: AnchorKeywords::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicTrackingConfig {
    pub window_size: usize,
    pub fixation_threshold: usize,
    pub decay_factor: f64,
    pub min_word_length: usize,
    pub custom_patterns: Vec<String>,
    pub stop_words: Vec<String>,
}

impl Default for TopicTrackingConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            fixation_threshold: 3,
            decay_factor: 0.5,
            min_word_length: 4,
            custom_patterns: Vec::new(),
            stop_words: default_stop_words(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    pub threshold: f64,
    pub fallback_messages: usize,
    pub task_aware_compaction: bool,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self { threshold: 0.80, fallback_messages: 20, task_aware_compaction: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenEstimationConfig {
    pub tokens_per_word: f64,
    pub special_char_token_weight: f64,
    pub default_max_tokens: usize,
}

impl Default for TokenEstimationConfig {
    fn default() -> Self {
        Self { tokens_per_word: 1.3, special_char_token_weight: 0.5, default_max_tokens: 8192 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub archive_dir: String,
    pub retention_days: i64,
    pub batch_index_delay_ms: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self { archive_dir: default_data_dir(), retention_days: 365, batch_index_delay_ms: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub db_file: String,
    pub endpoint: Option<String>,
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "nomic-embed-text".to_string(),
            db_file: "continuity.db".to_string(),
            endpoint: None,
            dimensions: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub recency_half_life_days: f64,
    pub recency_weight: f64,
    pub rrf_k: f64,
    pub relevance_threshold: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            recency_half_life_days: 14.0,
            recency_weight: 0.15,
            rrf_k: 60.0,
            relevance_threshold: 0.015,
        }
    }
}

fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.continuity")
}

fn default_stop_words() -> Vec<String> {
    [
        "the", "and", "for", "that", "this", "with", "have", "from", "your", "you", "are", "was",
        "were", "but", "not", "what", "when", "where", "which", "about", "would", "could",
        "should", "there", "their", "they", "them", "then", "than", "into", "just", "like",
        "will", "been", "being", "does", "doing", "very", "more", "some", "such",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_continuity_indicators() -> Vec<String> {
    [
        "remember",
        "recall",
        "you told",
        "last time",
        "before",
        "we talked about",
        "we discussed",
        "earlier you",
        "previously",
        "did i tell you",
        "do you know",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Catch-all for deployment-specific knobs not covered by the structured
/// config, so the host can pass extra settings through without a release.
pub type ExtraConfig = HashMap<String, serde_json::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_ratios_sum_to_one() {
        let cfg = ContinuityConfig::default();
        cfg.validate().expect("default config must validate");
    }

    #[test]
    fn load_with_missing_file_uses_defaults() {
        let cfg = ContinuityConfig::load(Some("/nonexistent/continuity.toml")).unwrap();
        assert_eq!(cfg.search.rrf_k, 60.0);
    }
}
