use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use continuity_archive::Archiver;
use continuity_core::config::ContinuityConfig;
use continuity_core::AgentId;
use continuity_context::{ContinuityAnchors, TopicTracker};
use continuity_index::{EmbeddingProvider, HttpEmbeddingProvider, IndexError, Indexer, ProviderChain, SearchResult, Searcher};

use crate::error::Result;

/// Everything this agent accumulates across a session: the archiver (always
/// ready — it is pure filesystem), the lazily-initialized DB-backed
/// indexer/searcher pair, and in-memory continuity state.
pub struct AgentState {
    pub agent_id: AgentId,
    pub session_start: DateTime<Utc>,
    pub exchange_count: std::sync::atomic::AtomicUsize,
    pub archiver: Archiver,
    storage: OnceCell<Arc<continuity_index::Storage>>,
    data_dir: PathBuf,
    config: ContinuityConfig,
    pub topics: Mutex<TopicTracker>,
    pub anchors: Mutex<ContinuityAnchors>,
    pub last_retrieval_cache: Mutex<Option<Vec<SearchResult>>>,
}

impl AgentState {
    pub fn new(agent_id: AgentId, data_dir: PathBuf, config: ContinuityConfig) -> Result<Self> {
        let archive_dir = data_dir.join("archive");
        let archiver = Archiver::new(&archive_dir)?;
        Ok(Self {
            topics: Mutex::new(TopicTracker::new(config.topic_tracking.clone())?),
            anchors: Mutex::new(ContinuityAnchors::new(config.anchors.clone())),
            last_retrieval_cache: Mutex::new(None),
            agent_id,
            session_start: Utc::now(),
            exchange_count: std::sync::atomic::AtomicUsize::new(0),
            archiver,
            storage: OnceCell::new(),
            data_dir,
            config,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn storage_ready(&self) -> bool {
        self.storage.initialized()
    }

    /// Lazily open the shared DB + embedding chain. Concurrent callers all
    /// await the same initialization via `OnceCell::get_or_try_init` and
    /// observe the same final `Storage`.
    pub async fn ensure_storage(&self) -> Result<Arc<continuity_index::Storage>> {
        self.storage
            .get_or_try_init(|| async {
                let endpoint = self
                    .config
                    .embedding
                    .endpoint
                    .clone()
                    .ok_or_else(|| IndexError::Embedding("no embedding endpoint configured".into()))?;
                let provider = HttpEmbeddingProvider::new(endpoint, self.config.embedding.model.clone());
                let dimension = match self.config.embedding.dimensions {
                    Some(d) => d,
                    None => provider.warmup().await?,
                };
                let chain = ProviderChain::new(vec![Box::new(provider) as Box<dyn EmbeddingProvider>]);
                let storage =
                    continuity_index::Storage::open(&self.data_dir, &self.config.embedding.db_file, dimension, chain)?;
                debug!(agent = %self.agent_id, dimension, "storage initialized");
                Ok::<_, crate::error::EngineError>(Arc::new(storage))
            })
            .await
            .cloned()
    }

    pub async fn indexer(&self) -> Result<Indexer> {
        Ok(Indexer::new(self.ensure_storage().await?))
    }

    pub async fn searcher(&self) -> Result<Searcher> {
        let storage = self.ensure_storage().await?;
        let search_config = continuity_index::SearchConfig {
            rrf_k: self.config.search.rrf_k,
            recency_half_life_days: self.config.search.recency_half_life_days,
            recency_weight: self.config.search.recency_weight,
        };
        Ok(Searcher::new(storage, search_config))
    }
}

/// Per-agent state, keyed by [`AgentId`] — deliberately not a process-wide
/// singleton so one agent's data can never leak into another's (§5).
pub struct StateRegistry {
    agents: DashMap<AgentId, Arc<AgentState>>,
    root_dir: PathBuf,
    config: ContinuityConfig,
}

impl StateRegistry {
    pub fn new(root_dir: PathBuf, config: ContinuityConfig) -> Self {
        Self { agents: DashMap::new(), root_dir, config }
    }

    /// Atomic upsert: concurrent first-callers for the same new `agent_id`
    /// race on the same map entry rather than each constructing their own
    /// `AgentState`, so a given agent's state is built exactly once.
    pub fn get_or_create(&self, agent_id: &AgentId) -> Result<Arc<AgentState>> {
        let data_dir = self.data_dir_for(agent_id);
        let config = self.config.clone();
        let entry = self
            .agents
            .entry(agent_id.clone())
            .or_try_insert_with(|| AgentState::new(agent_id.clone(), data_dir, config).map(Arc::new))?;
        Ok(entry.value().clone())
    }

    fn data_dir_for(&self, agent_id: &AgentId) -> PathBuf {
        if agent_id.is_main() {
            self.root_dir.clone()
        } else {
            self.root_dir.join("agents").join(agent_id.as_str())
        }
    }

    pub fn agents(&self) -> Vec<Arc<AgentState>> {
        self.agents.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_data_dirs_are_disjoint() {
        let registry = StateRegistry::new(PathBuf::from("/tmp/continuity-test"), ContinuityConfig::default());
        let main_dir = registry.data_dir_for(&AgentId::main());
        let other_dir = registry.data_dir_for(&AgentId::from("research-agent"));
        assert_ne!(main_dir, other_dir);
        assert!(other_dir.to_string_lossy().contains("research-agent"));
    }
}
