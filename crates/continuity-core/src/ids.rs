use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies which agent's memory domain a piece of state belongs to.
///
/// Every archive, database, and in-memory tracker is keyed by this — there is
/// no process-wide singleton anywhere in the crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    /// The default/unnamed agent — data for it lives directly under `dataDir`
    /// rather than under `dataDir/agents/{id}`.
    pub fn main() -> Self {
        Self("main".to_string())
    }

    pub fn is_main(&self) -> bool {
        self.0 == "main"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
