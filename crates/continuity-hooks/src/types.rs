use serde::{Deserialize, Serialize};

use continuity_core::{AgentId, Message};

/// Every point in the host's turn lifecycle the engine can observe.
///
/// Naming mirrors the host's own event vocabulary (§6 of the design) so a
/// thin adapter in the host process can dispatch 1-to-1 without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    BeforeAgentStart,
    BeforeToolCall,
    AfterToolCall,
    /// Synchronous — the handler must not perform I/O; see [`ToolResultPersist`].
    ToolResultPersist,
    AgentEnd,
    BeforeCompaction,
    SessionStart,
    SessionEnd,
}

/// `before_agent_start { messages }` — fired once per turn, before the host
/// dispatches the user's message to the model. The handler returns a string
/// to prepend to the user's message (empty string means "inject nothing").
#[derive(Debug, Clone)]
pub struct BeforeAgentStart {
    pub agent_id: AgentId,
    pub messages: Vec<Message>,
}

/// `before_tool_call { tool_name, params }` — may populate the retrieval
/// cache ahead of a later [`ToolResultPersist`] for the same call.
#[derive(Debug, Clone)]
pub struct BeforeToolCall {
    pub agent_id: AgentId,
    pub tool_name: String,
    pub params: serde_json::Value,
}

/// `after_tool_call { result }` — feeds mid-turn text to the topic tracker.
#[derive(Debug, Clone)]
pub struct AfterToolCall {
    pub agent_id: AgentId,
    pub tool_name: String,
    pub result: serde_json::Value,
}

/// `tool_result_persist { message }` with `tool_name == "memory_search"`.
///
/// **Synchronous.** The handler for this event must not suspend — it may
/// only read from state already populated by an earlier, asynchronous hook.
/// Enforced by construction: [`crate::LifecycleHandler::tool_result_persist`]
/// is a plain (non-async) method.
#[derive(Debug, Clone)]
pub struct ToolResultPersist {
    pub agent_id: AgentId,
    pub tool_name: String,
    pub message: Message,
}

/// `agent_end { messages }` — archives, indexes, and updates anchors/topics.
#[derive(Debug, Clone)]
pub struct AgentEnd {
    pub agent_id: AgentId,
    pub messages: Vec<Message>,
}

/// `before_compaction {}` — emits a log summary; carries no payload.
#[derive(Debug, Clone)]
pub struct BeforeCompaction {
    pub agent_id: AgentId,
}

/// `session_start { session_id }` — resets session counters.
#[derive(Debug, Clone)]
pub struct SessionStart {
    pub agent_id: AgentId,
    pub session_id: String,
}

/// `session_end { session_id, message_count }` — triggers a final index pass.
#[derive(Debug, Clone)]
pub struct SessionEnd {
    pub agent_id: AgentId,
    pub session_id: String,
    pub message_count: usize,
}
