use continuity_index::SearchResult;

/// Data-driven patterns for dropping exchanges that would read as noise if
/// surfaced back to the model — denial phrases on the agent side, or
/// meta-questions and session-reset boilerplate on the user side.
pub struct NoiseFilter {
    denial_phrases: Vec<String>,
    meta_questions: Vec<String>,
    session_reset_markers: Vec<String>,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self {
            denial_phrases: [
                "i don't have",
                "no memory of",
                "no recollection",
                "it looks like i don't",
                "i don't recall",
                "i don't have any information",
                "i'm not able to recall",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            meta_questions: [
                "do you remember",
                "do you recall",
                "did i tell you",
                "sorry to keep asking",
                "have i mentioned",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            session_reset_markers: ["new conversation", "starting fresh", "let's start over"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl NoiseFilter {
    /// Drop results matching any documented noise pattern.
    pub fn filter(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        results.into_iter().filter(|r| !self.is_noise(r)).collect()
    }

    fn is_noise(&self, result: &SearchResult) -> bool {
        let agent_lower = result.agent_text.as_deref().unwrap_or_default().to_lowercase();
        let user_lower = result.user_text.as_deref().unwrap_or_default().to_lowercase();

        if self.denial_phrases.iter().any(|p| agent_lower.contains(p.as_str())) {
            return true;
        }
        if self.meta_questions.iter().any(|p| user_lower.contains(p.as_str())) {
            return true;
        }
        if self.session_reset_markers.iter().any(|p| user_lower.contains(p.as_str())) {
            return true;
        }
        if is_trivially_short_and_formulaic(&user_lower, &agent_lower) {
            return true;
        }
        false
    }
}

fn is_trivially_short_and_formulaic(user_lower: &str, agent_lower: &str) -> bool {
    const FORMULAIC_REPLIES: &[&str] = &["ok", "okay", "sure", "got it", "sounds good", "alright"];
    user_lower.split_whitespace().count() <= 3
        && FORMULAIC_REPLIES.iter().any(|r| agent_lower.trim() == *r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(user: &str, agent: &str) -> SearchResult {
        SearchResult {
            id: "exchange_2025-06-01_0".into(),
            date: "2025-06-01".into(),
            exchange_index: 0,
            user_text: Some(user.to_string()),
            agent_text: Some(agent.to_string()),
            combined: String::new(),
            created_at: "2025-06-01T00:00:00Z".into(),
            distance: None,
            rrf_score: 0.0,
            recency_boost: 0.0,
            composite: 0.0,
        }
    }

    #[test]
    fn drops_denial_phrase_exchange() {
        let filter = NoiseFilter::default();
        let results = vec![result("do you remember my recipe?", "I don't have any information about that")];
        assert!(filter.filter(results).is_empty());
    }

    #[test]
    fn keeps_substantive_exchange() {
        let filter = NoiseFilter::default();
        let results = vec![result("I love sourdough", "Great bake!")];
        assert_eq!(filter.filter(results).len(), 1);
    }
}
