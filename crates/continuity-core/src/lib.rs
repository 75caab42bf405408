pub mod config;
pub mod error;
pub mod ids;
pub mod message;
pub mod token;

pub use config::ContinuityConfig;
pub use error::{CoreError, Result};
pub use ids::AgentId;
pub use message::{extract_text, Content, ContentPart, Message, Role};
pub use token::{HeuristicConfig, TokenEstimator, Tokenizer};
