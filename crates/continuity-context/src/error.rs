use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ContextError>;
