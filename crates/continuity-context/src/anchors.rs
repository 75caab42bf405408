use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use continuity_core::config::AnchorsConfig;
use continuity_core::{Message, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorType {
    Identity,
    Contradiction,
    Tension,
}

impl AnchorType {
    fn priority(self) -> f64 {
        match self {
            AnchorType::Identity => 1.0,
            AnchorType::Contradiction => 1.0,
            AnchorType::Tension => 0.7,
        }
    }

    fn label(self) -> &'static str {
        match self {
            AnchorType::Identity => "IDENTITY",
            AnchorType::Contradiction => "CONTRADICTION",
            AnchorType::Tension => "TENSION",
        }
    }
}

const MAX_ANCHOR_TEXT_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anchor {
    pub anchor_type: AnchorType,
    pub priority: f64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub message_index: usize,
    pub keyword: String,
}

/// Keyword-triggered moments worth carrying across turns: identity claims,
/// contradictions, and emotional tension. Detected from user text only.
pub struct ContinuityAnchors {
    config: AnchorsConfig,
    anchors: Vec<Anchor>,
}

impl ContinuityAnchors {
    pub fn new(config: AnchorsConfig) -> Self {
        Self { config, anchors: Vec::new() }
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Scan `messages` for anchor keywords and merge any new ones in, then
    /// prune by age, sort by priority, and cap at `maxCount`.
    pub fn detect(&mut self, messages: &[Message]) {
        if !self.config.enabled {
            return;
        }

        for (index, message) in messages.iter().enumerate() {
            if !matches!(message.role, Role::User) {
                continue;
            }
            let text = message.text();
            let lower = text.to_lowercase();

            for (anchor_type, keywords) in [
                (AnchorType::Identity, &self.config.keywords.identity),
                (AnchorType::Contradiction, &self.config.keywords.contradiction),
                (AnchorType::Tension, &self.config.keywords.tension),
            ] {
                if let Some(keyword) = keywords.iter().find(|kw| lower.contains(kw.as_str())) {
                    let already_present =
                        self.anchors.iter().any(|a| a.anchor_type == anchor_type && a.message_index == index);
                    if already_present {
                        continue;
                    }
                    self.anchors.push(Anchor {
                        anchor_type,
                        priority: anchor_type.priority(),
                        text: truncate_text(&text, MAX_ANCHOR_TEXT_CHARS),
                        timestamp: message.timestamp.unwrap_or_else(Utc::now),
                        message_index: index,
                        keyword: keyword.clone(),
                    });
                }
            }
        }

        self.prune();
    }

    fn prune(&mut self) {
        let now = Utc::now();
        self.anchors.retain(|a| (now - a.timestamp).num_seconds() <= self.config.max_age_secs);
        self.anchors.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        self.anchors.truncate(self.config.max_count);
    }

    /// Render as `[CONTINUITY ANCHORS]` plus one line per anchor, or an
    /// empty string if there is nothing to show.
    pub fn format(&self) -> String {
        if self.anchors.is_empty() {
            return String::new();
        }
        let mut out = String::from("[CONTINUITY ANCHORS]\n");
        let now = Utc::now();
        for anchor in &self.anchors {
            out.push_str(&format!(
                "{}: \"{}\" ({})\n",
                anchor.anchor_type.label(),
                anchor.text,
                format_age(now - anchor.timestamp)
            ));
        }
        out
    }
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

fn format_age(duration: chrono::Duration) -> String {
    let minutes = duration.num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}min ago")
    } else {
        format!("{}h ago", duration.num_hours())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_msg(text: &str) -> Message {
        Message::new(Role::User, text)
    }

    #[test]
    fn detects_identity_keyword_once_per_message() {
        let mut anchors = ContinuityAnchors::new(AnchorsConfig::default());
        anchors.detect(&[user_msg("hi, i'm Dana and i'm Dana again")]);
        assert_eq!(anchors.anchors().len(), 1);
        assert_eq!(anchors.anchors()[0].anchor_type, AnchorType::Identity);
    }

    #[test]
    fn format_emits_header_and_lines() {
        let mut anchors = ContinuityAnchors::new(AnchorsConfig::default());
        anchors.detect(&[user_msg("i am frustrated with this")]);
        let rendered = anchors.format();
        assert!(rendered.starts_with("[CONTINUITY ANCHORS]\n"));
        assert!(rendered.contains("IDENTITY") || rendered.contains("TENSION"));
    }

    #[test]
    fn empty_when_disabled() {
        let mut cfg = AnchorsConfig::default();
        cfg.enabled = false;
        let mut anchors = ContinuityAnchors::new(cfg);
        anchors.detect(&[user_msg("i am someone")]);
        assert!(anchors.anchors().is_empty());
        assert_eq!(anchors.format(), "");
    }

    #[test]
    fn truncates_long_text_to_200_chars() {
        let mut anchors = ContinuityAnchors::new(AnchorsConfig::default());
        let long = format!("i am {}", "x".repeat(400));
        anchors.detect(&[user_msg(&long)]);
        assert!(anchors.anchors()[0].text.chars().count() <= MAX_ANCHOR_TEXT_CHARS);
    }
}
