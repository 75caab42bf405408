use rusqlite::Connection;
use tracing::debug;

use crate::error::{IndexError, Result};

/// Registers the `sqlite-vec` extension with SQLite's auto-extension
/// mechanism. Must run once, before any connection is opened, since
/// `sqlite3_auto_extension` applies process-wide.
pub fn register_vec_extension() {
    unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite_vec::sqlite3_vec_init as *const (),
        )));
    }
}

/// Open the exchange database, set WAL mode, and create the `exchanges`
/// table, the `vec_exchanges` virtual table at dimension `dim`, and the
/// `fts_exchanges` virtual table (best-effort: its absence degrades search
/// to semantic-only, it never blocks startup).
pub fn open(path: &std::path::Path, dim: usize) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    create_exchanges_table(&conn)?;
    ensure_vec_table(&conn, dim)?;
    create_fts_table(&conn);
    Ok(conn)
}

fn create_exchanges_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS exchanges (
            id              TEXT PRIMARY KEY,
            date            TEXT NOT NULL,
            exchange_index  INTEGER NOT NULL,
            user_text       TEXT,
            agent_text      TEXT,
            combined        TEXT NOT NULL,
            metadata        TEXT,
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_exchanges_date ON exchanges(date);",
    )?;
    Ok(())
}

fn create_vec_table(conn: &Connection, dim: usize) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS vec_exchanges USING vec0(
            id TEXT PRIMARY KEY,
            embedding FLOAT[{dim}]
        );"
    ))?;
    Ok(())
}

/// `vec0` tables are fixed-width at creation and silently no-op on a second
/// `CREATE ... IF NOT EXISTS` at a different width. The configured embedding
/// dimension is tracked in `PRAGMA user_version`; a mismatch against the
/// stored value means the provider changed and the table must be rebuilt.
fn ensure_vec_table(conn: &Connection, dim: usize) -> Result<()> {
    let stored: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if stored == 0 {
        create_vec_table(conn, dim)?;
        conn.pragma_update(None, "user_version", dim as i64)?;
        return Ok(());
    }

    if stored as usize != dim {
        let err = IndexError::DimensionMismatch { expected: stored as usize, got: dim };
        tracing::warn!(error = %err, "embedding dimension changed, recreating vector table");
        conn.execute_batch("DROP TABLE IF EXISTS vec_exchanges;")?;
        create_vec_table(conn, dim)?;
        conn.pragma_update(None, "user_version", dim as i64)?;
    } else {
        create_vec_table(conn, dim)?;
    }
    Ok(())
}

/// FTS5 is optional: a build without it, or a corrupt module load, must not
/// prevent the rest of the store from working.
fn create_fts_table(conn: &Connection) {
    match conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS fts_exchanges USING fts5(id UNINDEXED, combined);",
    ) {
        Ok(_) => debug!("fts_exchanges table ready"),
        Err(e) => {
            tracing::warn!(error = %e, "FTS5 virtual table unavailable, search will degrade to semantic-only")
        }
    }
}

pub fn fts_available(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name='fts_exchanges'",
        [],
        |_| Ok(()),
    )
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_vec() -> Connection {
        register_vec_extension();
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn ensure_vec_table_records_dimension_on_first_create() {
        let conn = conn_with_vec();
        ensure_vec_table(&conn, 384).unwrap();
        let stored: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0)).unwrap();
        assert_eq!(stored, 384);
    }

    #[test]
    fn ensure_vec_table_recreates_on_dimension_change() {
        let conn = conn_with_vec();
        ensure_vec_table(&conn, 384).unwrap();
        ensure_vec_table(&conn, 768).unwrap();
        let stored: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0)).unwrap();
        assert_eq!(stored, 768);
    }
}
