use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, instrument, warn};

use continuity_core::{Message, Role};

use crate::error::{ArchiveError, Result};
use crate::types::{ArchivedMessage, ArchiveStats, DayFile, Sender};

/// Durable per-day conversation log with write-time deduplication.
///
/// One JSON file per calendar day under `{archive_dir}/{YYYY-MM-DD}.json`.
/// Writes are read-merge-rewrite — safe for a single process, which is all
/// the per-agent storage model ever has touching a given file (§5).
pub struct Archiver {
    archive_dir: PathBuf,
}

impl Archiver {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Result<Self> {
        let archive_dir = archive_dir.into();
        fs::create_dir_all(&archive_dir)?;
        Ok(Self { archive_dir })
    }

    fn day_path(&self, date: &str) -> PathBuf {
        self.archive_dir.join(format!("{date}.json"))
    }

    /// Append `messages` into their respective day files, skipping anything
    /// already present under the same `(timestamp, sender)` key.
    #[instrument(skip(self, messages), fields(count = messages.len()))]
    pub fn archive(&self, messages: &[Message]) -> Result<()> {
        let mut by_date: BTreeMap<String, Vec<ArchivedMessage>> = BTreeMap::new();

        for msg in messages {
            let sender = match msg.role {
                Role::User => Sender::User,
                Role::Assistant => Sender::Agent,
                _ => continue,
            };
            let ts = msg.timestamp.unwrap_or_else(Utc::now);
            let date = ts.format("%Y-%m-%d").to_string();
            by_date.entry(date).or_default().push(ArchivedMessage {
                timestamp: ts.to_rfc3339(),
                sender,
                text: msg.text(),
            });
        }

        for (date, new_entries) in by_date {
            self.merge_day(&date, new_entries)?;
        }
        Ok(())
    }

    fn merge_day(&self, date: &str, new_entries: Vec<ArchivedMessage>) -> Result<()> {
        let mut day = self.load_day_tolerant(date);
        let mut seen: HashSet<String> = day.messages.iter().map(|m| m.dedup_key()).collect();

        let mut added = 0;
        for entry in new_entries {
            let key = entry.dedup_key();
            if seen.insert(key) {
                day.messages.push(entry);
                added += 1;
            }
        }

        if added == 0 {
            debug!(date, "no new unique messages to archive");
            return Ok(());
        }

        day.messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        day.message_count = day.messages.len();
        day.date = date.to_string();

        let path = self.day_path(date);
        let json = serde_json::to_vec_pretty(&day)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        debug!(date, added, total = day.message_count, "archived day file written");
        Ok(())
    }

    /// Load a day file, tolerating a missing or corrupt file by treating it
    /// as empty rather than failing the whole archive pass (§7).
    fn load_day_tolerant(&self, date: &str) -> DayFile {
        let path = self.day_path(date);
        match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<DayFile>(&bytes) {
                Ok(day) => day,
                Err(e) => {
                    warn!(date, error = %e, "corrupt archive day file, treating as empty");
                    DayFile::empty(date)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DayFile::empty(date),
            Err(e) => {
                warn!(date, error = %e, "failed reading archive day file, treating as empty");
                DayFile::empty(date)
            }
        }
    }

    pub fn get_conversation(&self, date: &str) -> Result<Vec<ArchivedMessage>> {
        let path = self.day_path(date);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let bytes = fs::read(&path)?;
        let day: DayFile = serde_json::from_slice(&bytes)?;
        Ok(day.messages)
    }

    /// All archived dates, ascending.
    pub fn get_dates(&self) -> Result<Vec<String>> {
        let mut dates = Vec::new();
        for entry in fs::read_dir(&self.archive_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if NaiveDate::parse_from_str(stem, "%Y-%m-%d").is_ok() {
                    dates.push(stem.to_string());
                }
            }
        }
        dates.sort();
        Ok(dates)
    }

    pub fn get_stats(&self) -> Result<ArchiveStats> {
        let dates = self.get_dates()?;
        let mut total_messages = 0;
        for date in &dates {
            total_messages += self.get_conversation(date)?.len();
        }
        Ok(ArchiveStats {
            total_days: dates.len(),
            total_messages,
            oldest_date: dates.first().cloned(),
            newest_date: dates.last().cloned(),
        })
    }

    /// Dates present on disk but absent from `indexed`.
    pub fn get_unindexed_dates(&self, indexed: &BTreeSet<String>) -> Result<Vec<String>> {
        Ok(self.get_dates()?.into_iter().filter(|d| !indexed.contains(d)).collect())
    }

    /// Delete day files older than `retention_days` relative to today (UTC).
    /// Returns the number of files removed.
    pub fn prune_old(&self, retention_days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).date_naive();
        let mut pruned = 0;
        for date in self.get_dates()? {
            let day = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|_| ArchiveError::InvalidDate(date.clone()))?;
            if day < cutoff {
                let path = self.day_path(&date);
                fs::remove_file(&path)?;
                pruned += 1;
                debug!(date, "pruned expired archive day file");
            }
        }
        Ok(pruned)
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }
}

/// Convenience used by callers needing a bare timestamp→date mapping, e.g.
/// the indexer's fallback `created_at` derivation (§4.8).
pub fn date_of(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use continuity_core::Role;

    fn msg(role: Role, text: &str, ts: DateTime<Utc>) -> Message {
        Message::new(role, text).with_timestamp(ts)
    }

    #[test]
    fn archive_then_archive_again_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let archiver = Archiver::new(tmp.path()).unwrap();
        let ts = DateTime::parse_from_rfc3339("2025-06-01T10:00:00Z").unwrap().with_timezone(&Utc);
        let messages = vec![
            msg(Role::User, "I love sourdough", ts),
            msg(Role::Assistant, "Great bake!", ts + chrono::Duration::seconds(1)),
        ];

        archiver.archive(&messages).unwrap();
        let first = archiver.get_conversation("2025-06-01").unwrap();
        archiver.archive(&messages).unwrap();
        let second = archiver.get_conversation("2025-06-01").unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn dedup_by_timestamp_and_sender() {
        let tmp = tempfile::tempdir().unwrap();
        let archiver = Archiver::new(tmp.path()).unwrap();
        let ts = Utc::now();
        let messages = vec![msg(Role::User, "hello", ts), msg(Role::User, "hello again", ts)];
        archiver.archive(&messages).unwrap();
        let date = date_of(ts);
        let stored = archiver.get_conversation(&date).unwrap();
        // Same (timestamp, sender) key — only the first write wins.
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "hello");
    }

    #[test]
    fn corrupt_day_file_is_treated_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("2025-06-02.json"), b"not json").unwrap();
        let archiver = Archiver::new(tmp.path()).unwrap();
        let ts = DateTime::parse_from_rfc3339("2025-06-02T09:00:00Z").unwrap().with_timezone(&Utc);
        archiver.archive(&[msg(Role::User, "recovering", ts)]).unwrap();
        let stored = archiver.get_conversation("2025-06-02").unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn prune_old_removes_expired_days_only() {
        let tmp = tempfile::tempdir().unwrap();
        let archiver = Archiver::new(tmp.path()).unwrap();
        let old_ts = Utc::now() - chrono::Duration::days(400);
        let recent_ts = Utc::now() - chrono::Duration::days(1);
        archiver.archive(&[msg(Role::User, "old", old_ts)]).unwrap();
        archiver.archive(&[msg(Role::User, "recent", recent_ts)]).unwrap();

        let pruned = archiver.prune_old(365).unwrap();
        assert_eq!(pruned, 1);
        assert_eq!(archiver.get_dates().unwrap().len(), 1);
    }

    #[test]
    fn only_user_and_assistant_roles_are_archived() {
        let tmp = tempfile::tempdir().unwrap();
        let archiver = Archiver::new(tmp.path()).unwrap();
        let ts = Utc::now();
        archiver
            .archive(&[msg(Role::System, "system prompt", ts), msg(Role::Tool, "tool output", ts)])
            .unwrap();
        assert!(archiver.get_dates().unwrap().is_empty());
    }
}
