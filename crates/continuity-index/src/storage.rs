use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use rusqlite::Connection;
use tracing::debug;

use crate::db;
use crate::embedding::ProviderChain;
use crate::error::Result;
use crate::types::IndexLog;

static VEC_EXTENSION_INIT: Once = Once::new();

/// Database handle and embedding chain shared between the Indexer and the
/// Searcher for one agent. WAL mode lets the searcher read while the
/// indexer holds a write transaction.
pub struct Storage {
    conn: Mutex<Connection>,
    pub embeddings: ProviderChain,
    pub dimension: usize,
    log_path: PathBuf,
    fts_available: bool,
}

impl Storage {
    /// `dimension` must already be known (discovered from a provider warmup
    /// call by the caller) since the vector virtual table is fixed-width at
    /// creation time.
    pub fn open(data_dir: &Path, db_file: &str, dimension: usize, embeddings: ProviderChain) -> Result<Self> {
        VEC_EXTENSION_INIT.call_once(db::register_vec_extension);
        fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(db_file);
        let conn = db::open(&db_path, dimension)?;
        let fts_available = db::fts_available(&conn);
        debug!(path = %db_path.display(), dimension, fts_available, "index database ready");
        Ok(Self {
            conn: Mutex::new(conn),
            embeddings,
            dimension,
            log_path: data_dir.join("index-log.json"),
            fts_available,
        })
    }

    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Computed once at `open()` time; never re-queries the connection, so
    /// it is safe to call while holding `conn()`'s lock.
    pub fn fts_available(&self) -> bool {
        self.fts_available
    }

    pub fn load_index_log(&self) -> IndexLog {
        match fs::read(&self.log_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => IndexLog::default(),
        }
    }

    pub fn save_index_log(&self, log: &IndexLog) -> Result<()> {
        let json = serde_json::to_vec_pretty(log)?;
        let tmp = self.log_path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.log_path)?;
        Ok(())
    }
}
