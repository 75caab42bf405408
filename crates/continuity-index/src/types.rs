use serde::{Deserialize, Serialize};

/// One paired (user, agent) turn, indexed as a single searchable unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRow {
    pub id: String,
    pub date: String,
    pub exchange_index: i64,
    pub user_text: Option<String>,
    pub agent_text: Option<String>,
    pub combined: String,
    pub metadata: Option<String>,
    pub created_at: String,
}

impl ExchangeRow {
    pub fn id_for(date: &str, index: i64) -> String {
        format!("exchange_{date}_{index}")
    }
}

/// A row surfaced by the searcher, with both retrieval-internal and
/// presentation-ready fields attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub date: String,
    pub exchange_index: i64,
    pub user_text: Option<String>,
    pub agent_text: Option<String>,
    pub combined: String,
    pub created_at: String,
    pub distance: Option<f64>,
    pub rrf_score: f64,
    pub recency_boost: f64,
    pub composite: f64,
}

/// Persisted `{dates, lastIndexed}` log so maintenance can skip already
/// indexed days.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexLog {
    pub dates: std::collections::BTreeSet<String>,
    pub last_indexed: Option<String>,
}

impl IndexLog {
    pub fn mark(&mut self, date: &str) {
        self.dates.insert(date.to_string());
        self.last_indexed = Some(date.to_string());
    }

    pub fn contains(&self, date: &str) -> bool {
        self.dates.contains(date)
    }
}
