use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Archive(#[from] continuity_archive::ArchiveError),

    #[error(transparent)]
    Index(#[from] continuity_index::IndexError),

    #[error(transparent)]
    Context(#[from] continuity_context::ContextError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
