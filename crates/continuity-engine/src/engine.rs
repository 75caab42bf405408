use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use continuity_core::config::ContinuityConfig;
use continuity_core::{Message, Role};
use continuity_context::{render_recall_block, strip_previous_injection, Injection, NoiseFilter};
use continuity_hooks::{
    AfterToolCall, AgentEnd, BeforeAgentStart, BeforeCompaction, BeforeToolCall, LifecycleHandler,
    SessionEnd, SessionStart, ToolResultPersist,
};
use continuity_index::SearchResult;

use crate::state::StateRegistry;

const MIN_QUERY_CHARS: usize = 10;
const INJECTION_SEARCH_LIMIT: usize = 30;
const INJECTION_TOP_N: usize = 3;
const TOOL_RESULT_SYNTHESIS_LIMIT: usize = 5;
const ARCHIVE_SNIPPET_CHARS: usize = 700;

/// Implements the host's lifecycle contract: retrieval gating and injection
/// on turn start, topic tracking on tool results, archiving + indexing on
/// agent end, and synchronous recall synthesis for `memory_search` results.
pub struct ContinuityEngine {
    config: ContinuityConfig,
    registry: StateRegistry,
    noise_filter: NoiseFilter,
}

impl ContinuityEngine {
    pub fn new(data_dir: PathBuf, config: ContinuityConfig) -> Self {
        let registry = StateRegistry::new(data_dir, config.clone());
        Self { config, registry, noise_filter: NoiseFilter::default() }
    }

    pub fn registry(&self) -> &StateRegistry {
        &self.registry
    }

    pub fn config_snapshot(&self) -> &ContinuityConfig {
        &self.config
    }

    fn has_continuity_intent(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.config.continuity_indicators.iter().any(|indicator| lower.contains(indicator.as_str()))
    }

    async fn run_retrieval(&self, agent_id: &continuity_core::AgentId, query: &str) -> Vec<SearchResult> {
        let state = match self.registry.get_or_create(agent_id) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to resolve agent state, skipping retrieval");
                return Vec::new();
            }
        };
        let searcher = match state.searcher().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "storage unavailable, retrieval disabled this turn");
                return Vec::new();
            }
        };
        match searcher.search(query, INJECTION_SEARCH_LIMIT).await {
            Ok(results) => self.noise_filter.filter(results),
            Err(e) => {
                warn!(error = %e, "search failed, returning no results");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl LifecycleHandler for ContinuityEngine {
    #[instrument(skip(self, event))]
    async fn before_agent_start(&self, event: BeforeAgentStart) -> String {
        let Some(last_user) = event.messages.iter().rev().find(|m| matches!(m.role, Role::User)) else {
            return String::new();
        };

        let cleaned = strip_previous_injection(&last_user.text());
        if cleaned.trim().chars().count() < MIN_QUERY_CHARS {
            return String::new();
        }

        let results = self.run_retrieval(&event.agent_id, &cleaned).await;

        let state = match self.registry.get_or_create(&event.agent_id) {
            Ok(s) => s,
            Err(_) => return String::new(),
        };
        *state.last_retrieval_cache.lock().await = Some(results.clone());

        let has_intent = self.has_continuity_intent(&cleaned);
        let fts_hybrid = results.iter().any(|r| r.rrf_score > 0.0);
        let top_score = results.first().map(|r| r.composite).unwrap_or(0.0);
        let should_inject = has_intent
            || if fts_hybrid {
                top_score > self.config.search.relevance_threshold
            } else {
                top_score < self.config.search.relevance_threshold
            };

        if !should_inject || results.is_empty() {
            return String::new();
        }

        let top: Vec<SearchResult> = results.into_iter().take(INJECTION_TOP_N).collect();
        let mut injection = Injection::default();
        injection.recall = Some(render_recall_block(&top));
        injection.render()
    }

    #[instrument(skip(self, event))]
    async fn before_tool_call(&self, event: BeforeToolCall) {
        debug!(agent = %event.agent_id, tool = %event.tool_name, "before_tool_call");
    }

    #[instrument(skip(self, event))]
    async fn after_tool_call(&self, event: AfterToolCall) {
        let Ok(state) = self.registry.get_or_create(&event.agent_id) else { return };
        let text = event.result.to_string();
        state.topics.lock().await.track(&text, None);
    }

    /// Synchronous: reads only the cache `before_agent_start` already
    /// populated this turn, never touches storage directly.
    fn tool_result_persist(&self, event: ToolResultPersist) -> Option<Message> {
        if event.tool_name != "memory_search" {
            return None;
        }

        let parsed: serde_json::Value = serde_json::from_str(&event.message.text()).ok()?;
        let result_count = parsed.get("results").and_then(|r| r.as_array()).map(|a| a.len()).unwrap_or(0);
        if result_count >= 2 {
            return None;
        }

        let state = self.registry.get_or_create(&event.agent_id).ok()?;
        let cache = state.last_retrieval_cache.try_lock().ok()?;
        let cached = cache.as_ref()?;
        if cached.is_empty() {
            return None;
        }

        let synthesized: Vec<serde_json::Value> = cached
            .iter()
            .take(TOOL_RESULT_SYNTHESIS_LIMIT)
            .enumerate()
            .map(|(i, r)| {
                serde_json::json!({
                    "id": format!("archive_{}_{}", r.date, i),
                    "path": format!("archive/{}.json", r.date),
                    "snippet": truncate(&r.combined, ARCHIVE_SNIPPET_CHARS),
                    "source": "conversation-archive",
                    "score": r.distance.map(|d| 1.0 - d).unwrap_or(r.composite),
                })
            })
            .collect();

        let recall_block = render_recall_block(cached);
        let recall_prefix = recall_block.replace(
            "You remember these earlier conversations with this user:",
            "They told you:",
        );

        let mut modified = parsed;
        if let Some(obj) = modified.as_object_mut() {
            obj.insert("results".to_string(), serde_json::Value::Array(synthesized));
        }

        let body = format!(
            "{recall_prefix}\nSpeak from this memory naturally when answering.\n{}",
            serde_json::to_string(&modified).ok()?
        );

        Some(Message::new(Role::Tool, body))
    }

    #[instrument(skip(self, event))]
    async fn agent_end(&self, event: AgentEnd) {
        let Ok(state) = self.registry.get_or_create(&event.agent_id) else { return };

        if let Err(e) = state.archiver.archive(&event.messages) {
            warn!(agent = %event.agent_id, error = %e, "archive write failed at agent_end");
        }

        state.anchors.lock().await.detect(&event.messages);

        let date = continuity_archive::date_of(chrono::Utc::now());
        match state.indexer().await {
            Ok(indexer) => {
                if let Ok(conversation) = state.archiver.get_conversation(&date) {
                    let messages: Vec<Message> = conversation
                        .into_iter()
                        .map(|m| {
                            let role = match m.sender {
                                continuity_archive::Sender::User => Role::User,
                                continuity_archive::Sender::Agent => Role::Assistant,
                            };
                            Message::new(role, m.text)
                        })
                        .collect();
                    if let Err(e) = indexer.index_day(&date, &messages).await {
                        warn!(agent = %event.agent_id, error = %e, "index_day failed at agent_end");
                    }
                }
            }
            Err(e) => warn!(agent = %event.agent_id, error = %e, "indexer unavailable at agent_end"),
        }

        state.exchange_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    #[instrument(skip(self, event))]
    async fn before_compaction(&self, event: BeforeCompaction) {
        debug!(agent = %event.agent_id, "compaction about to run");
    }

    #[instrument(skip(self, event))]
    async fn session_start(&self, event: SessionStart) {
        if let Ok(state) = self.registry.get_or_create(&event.agent_id) {
            state.exchange_count.store(0, std::sync::atomic::Ordering::Relaxed);
            debug!(agent = %event.agent_id, session = %event.session_id, "session started");
        }
    }

    #[instrument(skip(self, event))]
    async fn session_end(&self, event: SessionEnd) {
        debug!(agent = %event.agent_id, session = %event.session_id, messages = event.message_count, "session ended");

        let Ok(state) = self.registry.get_or_create(&event.agent_id) else { return };
        let date = continuity_archive::date_of(chrono::Utc::now());
        match state.indexer().await {
            Ok(indexer) => {
                if let Ok(conversation) = state.archiver.get_conversation(&date) {
                    let messages: Vec<Message> = conversation
                        .into_iter()
                        .map(|m| {
                            let role = match m.sender {
                                continuity_archive::Sender::User => Role::User,
                                continuity_archive::Sender::Agent => Role::Assistant,
                            };
                            Message::new(role, m.text)
                        })
                        .collect();
                    if let Err(e) = indexer.index_day(&date, &messages).await {
                        warn!(agent = %event.agent_id, error = %e, "index_day failed at session_end");
                    }
                }
            }
            Err(e) => warn!(agent = %event.agent_id, error = %e, "indexer unavailable at session_end"),
        }
    }
}

fn truncate(text: &str, limit: usize) -> String {
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
    fn continuity_intent_matches_configured_indicators() {
        let engine = ContinuityEngine::new(PathBuf::from("/tmp/continuity-test-engine"), ContinuityConfig::default());
        assert!(engine.has_continuity_intent("do you remember what I said?"));
        assert!(!engine.has_continuity_intent("what's the weather today"));
    }
}
