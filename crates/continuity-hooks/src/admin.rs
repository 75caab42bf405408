use serde::{Deserialize, Serialize};

use continuity_core::AgentId;

/// `getState(agentId?)` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStateView {
    pub archive_stats: serde_json::Value,
    pub topics: serde_json::Value,
    pub anchors: serde_json::Value,
    pub exchange_count: usize,
    pub session_age_secs: i64,
    pub index_ready: bool,
}

/// `search({text|query, limit, agentId?})` request/response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: usize,
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}

fn default_search_limit() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub exchanges: Vec<serde_json::Value>,
    pub distances: Vec<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `getTopics(agentId?)` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsResponse {
    pub topics: serde_json::Value,
    pub fixated: Vec<String>,
}

/// `listAgents()` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_id: AgentId,
    pub exchange_count: usize,
    pub storage_ready: bool,
    pub data_dir: String,
}

/// Request/response surface for administrative (non-lifecycle) calls.
///
/// Implemented by the engine; dispatch by name from whatever the host's own
/// RPC/CLI surface looks like is outside this crate's concern.
#[async_trait::async_trait]
pub trait AdminApi: Send + Sync {
    async fn get_state(&self, agent_id: Option<AgentId>) -> AgentStateView;
    async fn get_config(&self) -> serde_json::Value;
    async fn search(&self, req: SearchRequest) -> SearchResponse;
    async fn get_archive_stats(&self, agent_id: Option<AgentId>) -> serde_json::Value;
    async fn get_topics(&self, agent_id: Option<AgentId>) -> TopicsResponse;
    async fn list_agents(&self) -> Vec<AgentSummary>;
}
