use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender role on a message in the host's conversation stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn is_user(&self) -> bool {
        matches!(self, Role::User)
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Role::Assistant)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// One chunk of a multi-part message body.
///
/// `content` lets a part nest (some hosts wrap tool results this way); we only
/// ever read `text`, so nesting is opaque to us.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
}

/// Message body: either a plain string or a list of parts.
///
/// Hosts disagree on which shape they send; everything downstream should go
/// through [`extract_text`] rather than matching on this directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Concatenate every `text` field in a [`Content`], in order.
///
/// The single path every component uses to turn a message body into a string
/// — see the "dynamic message shapes" design note.
pub fn extract_text(content: &Content) -> String {
    match content {
        Content::Text(s) => s.clone(),
        Content::Parts(parts) => parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join(""),
    }
}

/// A single turn as delivered by the host's event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_params: Option<serde_json::Value>,
}

impl Message {
    pub fn text(&self) -> String {
        extract_text(&self.content)
    }

    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Content::Text(text.into()),
            timestamp: None,
            tool_name: None,
            tool_params: None,
        }
    }

    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_text_concatenates_parts_in_order() {
        let content = Content::Parts(vec![
            ContentPart { kind: Some("text".into()), text: Some("hello ".into()), content: None },
            ContentPart { kind: Some("text".into()), text: None, content: None },
            ContentPart { kind: Some("text".into()), text: Some("world".into()), content: None },
        ]);
        assert_eq!(extract_text(&content), "hello world");
    }

    #[test]
    fn extract_text_plain_string_passthrough() {
        let content = Content::Text("just a string".into());
        assert_eq!(extract_text(&content), "just a string");
    }

    #[test]
    fn message_deserializes_string_content() {
        let json = r#"{"role":"user","content":"hi there"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.text(), "hi there");
        assert!(msg.role.is_user());
    }

    #[test]
    fn message_deserializes_parts_content() {
        let json = r#"{"role":"assistant","content":[{"type":"text","text":"ok"}]}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.text(), "ok");
    }
}
