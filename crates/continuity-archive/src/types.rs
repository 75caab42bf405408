use serde::{Deserialize, Serialize};

/// Who sent an archived message — collapsed from [`continuity_core::Role`]
/// since the archive only ever stores the two conversational sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Agent => write!(f, "agent"),
        }
    }
}

/// A single persisted line in a day file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedMessage {
    /// ISO-8601 instant.
    pub timestamp: String,
    pub sender: Sender,
    pub text: String,
}

impl ArchivedMessage {
    /// Dedup key: `"{timestamp}_{sender}"`.
    pub fn dedup_key(&self) -> String {
        format!("{}_{}", self.timestamp, self.sender)
    }
}

/// On-disk shape of `archive/{YYYY-MM-DD}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayFile {
    pub date: String,
    pub message_count: usize,
    pub messages: Vec<ArchivedMessage>,
}

impl DayFile {
    pub fn empty(date: impl Into<String>) -> Self {
        Self { date: date.into(), message_count: 0, messages: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub total_days: usize,
    pub total_messages: usize,
    pub oldest_date: Option<String>,
    pub newest_date: Option<String>,
}
