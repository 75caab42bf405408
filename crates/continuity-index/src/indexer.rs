use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use continuity_core::Message;

use crate::embedding::EmbedPurpose;
use crate::error::Result;
use crate::pairing::{pair_messages, PairedExchange};
use crate::storage::Storage;
use crate::types::ExchangeRow;

pub struct Indexer {
    storage: Arc<Storage>,
}

pub(crate) fn serialize_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn combined_text(date: &str, exchange: &PairedExchange) -> String {
    let hhmm = exchange
        .user
        .as_ref()
        .or(exchange.agent.as_ref())
        .and_then(|m| m.timestamp)
        .unwrap_or_else(Utc::now)
        .format("%H:%M");

    let mut out = format!("[{date} {hhmm}]\n");
    if let Some(user) = &exchange.user {
        out.push_str(&format!("User: {}\n", user.text()));
    }
    if let Some(agent) = &exchange.agent {
        out.push_str(&format!("Agent: {}\n", agent.text()));
    }
    out
}

impl Indexer {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Pair `messages` into exchanges, embed and upsert each one
    /// transactionally, and mark `date` as indexed.
    #[instrument(skip(self, messages), fields(date, count = messages.len()))]
    pub async fn index_day(&self, date: &str, messages: &[Message]) -> Result<usize> {
        let exchanges = pair_messages(messages);
        if exchanges.is_empty() {
            debug!(date, "no exchanges to index");
            return Ok(0);
        }

        let combined: Vec<String> = exchanges.iter().map(|e| combined_text(date, e)).collect();
        let vectors = self.storage.embeddings.embed(&combined, EmbedPurpose::Document).await?;

        let created_at = Utc::now().to_rfc3339();
        let conn = self.storage.conn();
        let tx = conn.unchecked_transaction()?;

        for (i, (exchange, combined_text)) in exchanges.iter().zip(combined.iter()).enumerate() {
            let id = ExchangeRow::id_for(date, i as i64);
            let user_text = exchange.user.as_ref().map(|m| m.text());
            let agent_text = exchange.agent.as_ref().map(|m| m.text());

            tx.execute(
                "INSERT INTO exchanges (id, date, exchange_index, user_text, agent_text, combined, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    user_text = excluded.user_text,
                    agent_text = excluded.agent_text,
                    combined = excluded.combined,
                    created_at = excluded.created_at",
                rusqlite::params![id, date, i as i64, user_text, agent_text, combined_text, created_at],
            )?;

            // vec0 virtual tables have no UPSERT; replace via delete-then-insert.
            tx.execute("DELETE FROM vec_exchanges WHERE id = ?1", rusqlite::params![id])?;
            if let Some(vector) = vectors.get(i) {
                tx.execute(
                    "INSERT INTO vec_exchanges (id, embedding) VALUES (?1, ?2)",
                    rusqlite::params![id, serialize_embedding(vector)],
                )?;
            }

            if self.storage.fts_available() {
                tx.execute("DELETE FROM fts_exchanges WHERE id = ?1", rusqlite::params![id])?;
                tx.execute(
                    "INSERT INTO fts_exchanges (id, combined) VALUES (?1, ?2)",
                    rusqlite::params![id, combined_text],
                )?;
            }
        }

        tx.commit()?;

        let mut log = self.storage.load_index_log();
        log.mark(date);
        self.storage.save_index_log(&log)?;

        debug!(date, exchanges = exchanges.len(), "day indexed");
        Ok(exchanges.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use continuity_core::Role;

    #[test]
    fn combined_text_includes_both_sides() {
        let exchange = PairedExchange {
            user: Some(Message::new(Role::User, "hi there")),
            agent: Some(Message::new(Role::Assistant, "hello!")),
        };
        let text = combined_text("2025-06-01", &exchange);
        assert!(text.starts_with("[2025-06-01 "));
        assert!(text.contains("User: hi there"));
        assert!(text.contains("Agent: hello!"));
    }

    #[test]
    fn serialize_embedding_round_trips_length() {
        let vector = vec![1.0f32, -2.5, 3.25];
        let bytes = serialize_embedding(&vector);
        assert_eq!(bytes.len(), vector.len() * 4);
    }
}
