use continuity_index::SearchResult;

const RECALL_TRAILER: &str =
    "Speak from this memory naturally. Never say \"I don't have information\" about things you remember above.";

/// Typed sections making up an assembled context block, rendered through
/// one path rather than free-form string concatenation.
#[derive(Debug, Clone, Default)]
pub struct Injection {
    pub session: Option<String>,
    pub topics: Option<String>,
    pub anchors: Option<String>,
    pub recall: Option<String>,
}

impl Injection {
    pub fn render(&self) -> String {
        [&self.session, &self.topics, &self.anchors, &self.recall]
            .into_iter()
            .filter_map(|s| s.as_ref())
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

const TRUNCATE_CHARS: usize = 300;

fn truncate(text: &str) -> String {
    if text.chars().count() <= TRUNCATE_CHARS {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(TRUNCATE_CHARS).collect::<String>())
    }
}

/// Render the top recalled exchanges, sorted chronologically, as a
/// first-person recall block.
pub fn render_recall_block(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut sorted: Vec<&SearchResult> = results.iter().collect();
    sorted.sort_by(|a, b| (&a.date, a.exchange_index).cmp(&(&b.date, b.exchange_index)));

    let mut out = String::from("You remember these earlier conversations with this user:\n");
    for r in sorted {
        if let Some(user_text) = &r.user_text {
            out.push_str(&format!("- They told you: \"{}\"\n", truncate(user_text)));
        }
        if let Some(agent_text) = &r.agent_text {
            out.push_str(&format!("  You said: \"{}\"\n", truncate(agent_text)));
        }
    }
    out.push_str(RECALL_TRAILER);
    out
}

const RECALL_HEADERS: &[&str] =
    &["You remember these earlier conversations", "From your knowledge base:"];
const CONTEXT_HEADERS: &[&str] = &["[CONTINUITY CONTEXT]", "[STABILITY CONTEXT]"];

/// Strip a previously injected block from the front of incoming user text,
/// cutting through to the first day-name timestamp bracket if one is found,
/// else removing just the known header line.
pub fn strip_previous_injection(text: &str) -> String {
    let trimmed = text.trim_start();

    let starts_with_known_block = RECALL_HEADERS.iter().any(|h| trimmed.starts_with(h))
        || CONTEXT_HEADERS.iter().any(|h| trimmed.starts_with(h));
    if !starts_with_known_block {
        return text.to_string();
    }

    if let Some(idx) = find_day_timestamp_bracket(trimmed) {
        return trimmed[idx..].trim_start().to_string();
    }

    // No timestamp bracket: strip just the first line (the header itself).
    match trimmed.find('\n') {
        Some(newline) => trimmed[newline + 1..].trim_start().to_string(),
        None => String::new(),
    }
}

const DAY_NAMES: &[&str] = &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn find_day_timestamp_bracket(text: &str) -> Option<usize> {
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find('[') {
        let start = search_from + rel;
        if DAY_NAMES.iter().any(|d| text[start + 1..].starts_with(d)) {
            return Some(start);
        }
        search_from = start + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(date: &str, index: i64, user: &str, agent: &str) -> SearchResult {
        SearchResult {
            id: format!("exchange_{date}_{index}"),
            date: date.to_string(),
            exchange_index: index,
            user_text: Some(user.to_string()),
            agent_text: Some(agent.to_string()),
            combined: String::new(),
            created_at: format!("{date}T00:00:00Z"),
            distance: None,
            rrf_score: 0.0,
            recency_boost: 0.0,
            composite: 0.0,
        }
    }

    #[test]
    fn recall_block_sorts_chronologically_and_has_trailer() {
        let results =
            vec![result("2025-06-02", 0, "second day", "ok"), result("2025-06-01", 0, "first day", "ok")];
        let rendered = render_recall_block(&results);
        assert!(rendered.starts_with("You remember these earlier conversations with this user:"));
        let first_pos = rendered.find("first day").unwrap();
        let second_pos = rendered.find("second day").unwrap();
        assert!(first_pos < second_pos);
        assert!(rendered.ends_with(RECALL_TRAILER));
    }

    #[test]
    fn strips_recall_block_through_timestamp_bracket() {
        let text = "You remember these earlier conversations with this user:\n- They told you: \"x\"\n[Mon Jun 1] actual new message";
        let stripped = strip_previous_injection(text);
        assert_eq!(stripped, "[Mon Jun 1] actual new message");
    }

    #[test]
    fn leaves_ordinary_text_untouched() {
        let text = "just a normal message";
        assert_eq!(strip_previous_injection(text), text);
    }
}
