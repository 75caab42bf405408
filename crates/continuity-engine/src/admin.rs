use async_trait::async_trait;

use continuity_core::AgentId;
use continuity_hooks::{AdminApi, AgentStateView, AgentSummary, SearchRequest, SearchResponse, TopicsResponse};

use crate::engine::ContinuityEngine;

#[async_trait]
impl AdminApi for ContinuityEngine {
    async fn get_state(&self, agent_id: Option<AgentId>) -> AgentStateView {
        let agent_id = agent_id.unwrap_or_else(AgentId::main);
        let Ok(state) = self.registry().get_or_create(&agent_id) else {
            return AgentStateView {
                archive_stats: serde_json::Value::Null,
                topics: serde_json::Value::Null,
                anchors: serde_json::Value::Null,
                exchange_count: 0,
                session_age_secs: 0,
                index_ready: false,
            };
        };

        let archive_stats =
            state.archiver.get_stats().map(|s| serde_json::to_value(s).unwrap_or_default()).unwrap_or_default();
        let topics = state.topics.lock().await;
        let anchors = state.anchors.lock().await;

        AgentStateView {
            archive_stats,
            topics: serde_json::to_value(topics.topics()).unwrap_or_default(),
            anchors: serde_json::to_value(anchors.anchors()).unwrap_or_default(),
            exchange_count: state.exchange_count.load(std::sync::atomic::Ordering::Relaxed),
            session_age_secs: (chrono::Utc::now() - state.session_start).num_seconds(),
            index_ready: state.storage_ready(),
        }
    }

    async fn get_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config_snapshot()).unwrap_or_default()
    }

    async fn search(&self, req: SearchRequest) -> SearchResponse {
        let agent_id = req.agent_id.unwrap_or_else(AgentId::main);
        let Ok(state) = self.registry().get_or_create(&agent_id) else {
            return SearchResponse { exchanges: Vec::new(), distances: Vec::new(), error: Some("unknown agent".into()) };
        };
        let searcher = match state.searcher().await {
            Ok(s) => s,
            Err(e) => return SearchResponse { exchanges: Vec::new(), distances: Vec::new(), error: Some(e.to_string()) },
        };
        match searcher.search(&req.query, req.limit).await {
            Ok(results) => SearchResponse {
                distances: results.iter().map(|r| r.distance.unwrap_or(0.0)).collect(),
                exchanges: results.iter().map(|r| serde_json::to_value(r).unwrap_or_default()).collect(),
                error: None,
            },
            Err(e) => SearchResponse { exchanges: Vec::new(), distances: Vec::new(), error: Some(e.to_string()) },
        }
    }

    async fn get_archive_stats(&self, agent_id: Option<AgentId>) -> serde_json::Value {
        let agent_id = agent_id.unwrap_or_else(AgentId::main);
        match self.registry().get_or_create(&agent_id).and_then(|s| Ok(s.archiver.get_stats()?)) {
            Ok(stats) => serde_json::to_value(stats).unwrap_or_default(),
            Err(_) => serde_json::Value::Null,
        }
    }

    async fn get_topics(&self, agent_id: Option<AgentId>) -> TopicsResponse {
        let agent_id = agent_id.unwrap_or_else(AgentId::main);
        let Ok(state) = self.registry().get_or_create(&agent_id) else {
            return TopicsResponse { topics: serde_json::Value::Null, fixated: Vec::new() };
        };
        let topics = state.topics.lock().await;
        let fixated = topics.fixated_topics().into_iter().map(|(name, _)| name.clone()).collect();
        TopicsResponse { topics: serde_json::to_value(topics.topics()).unwrap_or_default(), fixated }
    }

    async fn list_agents(&self) -> Vec<AgentSummary> {
        self.registry()
            .agents()
            .into_iter()
            .map(|state| AgentSummary {
                agent_id: state.agent_id.clone(),
                exchange_count: state.exchange_count.load(std::sync::atomic::Ordering::Relaxed),
                storage_ready: state.storage_ready(),
                data_dir: state.data_dir().to_string_lossy().to_string(),
            })
            .collect()
    }
}
