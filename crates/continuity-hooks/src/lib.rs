pub mod admin;
pub mod error;
pub mod handler;
pub mod types;

pub use admin::{AdminApi, AgentStateView, AgentSummary, SearchRequest, SearchResponse, TopicsResponse};
pub use error::{HookError, Result};
pub use handler::{dispatch_with_timeout, LifecycleHandler};
pub use types::*;
