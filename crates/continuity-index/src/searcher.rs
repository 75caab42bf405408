use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::{instrument, warn};

use crate::embedding::EmbedPurpose;
use crate::error::Result;
use crate::storage::Storage;
use crate::types::SearchResult;

const RRF_K_DEFAULT: f64 = 60.0;
const RECENCY_HALF_LIFE_DAYS_DEFAULT: f64 = 14.0;
const RECENCY_WEIGHT_DEFAULT: f64 = 0.15;

#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    pub rrf_k: f64,
    pub recency_half_life_days: f64,
    pub recency_weight: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: RRF_K_DEFAULT,
            recency_half_life_days: RECENCY_HALF_LIFE_DAYS_DEFAULT,
            recency_weight: RECENCY_WEIGHT_DEFAULT,
        }
    }
}

struct RawRow {
    id: String,
    date: String,
    exchange_index: i64,
    user_text: Option<String>,
    agent_text: Option<String>,
    combined: String,
    created_at: String,
}

/// Hybrid semantic + keyword retriever sharing a DB with the [`crate::indexer::Indexer`].
///
/// Errors are intentionally swallowed into an empty result by callers at the
/// turn-handling boundary (§ retrieval gating) — `search` itself still
/// returns a `Result` so that boundary has something to log.
pub struct Searcher {
    storage: Arc<Storage>,
    config: SearchConfig,
}

impl Searcher {
    pub fn new(storage: Arc<Storage>, config: SearchConfig) -> Self {
        Self { storage, config }
    }

    #[instrument(skip(self), fields(query_len = query.len(), limit))]
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let fetch_limit = (2 * limit).min(60);

        let query_vectors = self.storage.embeddings.embed(&[query.to_string()], EmbedPurpose::Query).await?;
        let query_vector = query_vectors.into_iter().next().unwrap_or_default();

        let semantic = self.semantic_candidates(&query_vector, fetch_limit)?;
        let fts_on = self.storage.fts_available();
        let keyword = if fts_on { self.keyword_candidates(query, fetch_limit)? } else { Vec::new() };

        let mut rows: HashMap<String, RawRow> = HashMap::new();
        let mut semantic_rank: HashMap<String, usize> = HashMap::new();
        let mut keyword_rank: HashMap<String, usize> = HashMap::new();
        let mut distances: HashMap<String, f64> = HashMap::new();

        for (rank, (row, distance)) in semantic.into_iter().enumerate() {
            semantic_rank.insert(row.id.clone(), rank);
            distances.insert(row.id.clone(), distance);
            rows.insert(row.id.clone(), row);
        }
        for (rank, row) in keyword.into_iter().enumerate() {
            keyword_rank.insert(row.id.clone(), rank);
            rows.entry(row.id.clone()).or_insert(row);
        }

        let now = Utc::now();
        let mut results: Vec<SearchResult> = rows
            .into_iter()
            .map(|(id, row)| {
                let mut rrf = 0.0;
                if let Some(r) = semantic_rank.get(&id) {
                    rrf += 1.0 / (self.config.rrf_k + *r as f64 + 1.0);
                }
                if let Some(r) = keyword_rank.get(&id) {
                    rrf += 1.0 / (self.config.rrf_k + *r as f64 + 1.0);
                }

                let age_days = self.age_days(&row, now);
                let recency_boost =
                    (-age_days / self.config.recency_half_life_days).exp() * self.config.recency_weight;

                let distance = distances.get(&id).copied();
                let composite = if fts_on {
                    rrf * (1.0 + recency_boost)
                } else {
                    distance.unwrap_or(1.0) - recency_boost
                };

                SearchResult {
                    id,
                    date: row.date,
                    exchange_index: row.exchange_index,
                    user_text: row.user_text,
                    agent_text: row.agent_text,
                    combined: row.combined,
                    created_at: row.created_at,
                    distance,
                    rrf_score: rrf,
                    recency_boost,
                    composite,
                }
            })
            .collect();

        if fts_on {
            results.sort_by(|a, b| b.composite.partial_cmp(&a.composite).unwrap_or(std::cmp::Ordering::Equal));
        } else {
            results.sort_by(|a, b| a.composite.partial_cmp(&b.composite).unwrap_or(std::cmp::Ordering::Equal));
        }
        results.truncate(limit);
        Ok(results)
    }

    fn age_days(&self, row: &RawRow, now: DateTime<Utc>) -> f64 {
        let created = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| self.fallback_created_at(row));
        (now - created).num_seconds() as f64 / 86_400.0
    }

    fn fallback_created_at(&self, row: &RawRow) -> DateTime<Utc> {
        NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .map(|dt| Utc.from_utc_datetime(&dt) + chrono::Duration::minutes(row.exchange_index))
            .unwrap_or(Utc::now())
    }

    fn semantic_candidates(&self, query_vector: &[f32], fetch_limit: usize) -> Result<Vec<(RawRow, f64)>> {
        if query_vector.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.storage.conn();
        let embedding_bytes = crate::indexer::serialize_embedding(query_vector);
        let mut stmt = conn.prepare(
            "SELECT e.id, e.date, e.exchange_index, e.user_text, e.agent_text, e.combined, e.created_at, v.distance
             FROM vec_exchanges v JOIN exchanges e ON e.id = v.id
             WHERE v.embedding MATCH ?1 AND k = ?2
             ORDER BY v.distance ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![embedding_bytes, fetch_limit as i64], |r| {
            Ok((
                RawRow {
                    id: r.get(0)?,
                    date: r.get(1)?,
                    exchange_index: r.get(2)?,
                    user_text: r.get(3)?,
                    agent_text: r.get(4)?,
                    combined: r.get(5)?,
                    created_at: r.get(6)?,
                },
                r.get::<_, f64>(7)?,
            ))
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn keyword_candidates(&self, query: &str, fetch_limit: usize) -> Result<Vec<RawRow>> {
        let sanitized = sanitize_fts_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.storage.conn();
        let mut stmt = conn.prepare(
            "SELECT e.id, e.date, e.exchange_index, e.user_text, e.agent_text, e.combined, e.created_at
             FROM fts_exchanges f JOIN exchanges e ON e.id = f.id
             WHERE fts_exchanges MATCH ?1
             ORDER BY bm25(fts_exchanges) ASC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![sanitized, fetch_limit as i64], |r| {
            Ok(RawRow {
                id: r.get(0)?,
                date: r.get(1)?,
                exchange_index: r.get(2)?,
                user_text: r.get(3)?,
                agent_text: r.get(4)?,
                combined: r.get(5)?,
                created_at: r.get(6)?,
            })
        });
        match rows {
            Ok(rows) => Ok(rows.filter_map(|r| r.ok()).collect()),
            Err(e) => {
                warn!(error = %e, "keyword search query failed, continuing semantic-only");
                Ok(Vec::new())
            }
        }
    }
}

/// Strip FTS5 syntax characters, drop boolean-operator tokens, and quote
/// each surviving token so user text can never be interpreted as an FTS5
/// query expression.
fn sanitize_fts_query(query: &str) -> String {
    let stripped: String =
        query.chars().filter(|c| !matches!(c, '*' | '"' | '^' | '(' | ')' | '{' | '}' | '[' | ']' | ':')).collect();
    let normalized: String =
        stripped.chars().map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' }).collect();

    normalized
        .split_whitespace()
        .filter(|tok| tok.len() >= 2)
        .filter(|tok| !matches!(tok.to_uppercase().as_str(), "AND" | "OR" | "NOT" | "NEAR"))
        .map(|tok| format!("\"{tok}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_operators_and_syntax_chars() {
        let out = sanitize_fts_query("sourdough AND \"starter\" OR (discard)");
        assert!(!out.contains("AND"));
        assert!(!out.contains('"') || out.matches('"').count() % 2 == 0);
        assert!(out.contains("\"sourdough\""));
        assert!(out.contains("\"discard\""));
    }

    #[test]
    fn sanitize_drops_short_tokens() {
        let out = sanitize_fts_query("a to be bread");
        assert!(!out.contains("\"a\""));
        assert!(out.contains("\"bread\""));
    }
}
