pub mod db;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod pairing;
pub mod searcher;
pub mod storage;
pub mod types;

pub use embedding::{EmbedPurpose, EmbeddingProvider, HttpEmbeddingProvider, ProviderChain};
pub use error::{IndexError, Result};
pub use indexer::Indexer;
pub use pairing::{pair_messages, PairedExchange};
pub use searcher::{SearchConfig, Searcher};
pub use storage::Storage;
pub use types::{ExchangeRow, IndexLog, SearchResult};
