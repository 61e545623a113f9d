//! Core types for chat messages and backend payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Prefix shared by every client-generated id
const TEMPORARY_PREFIX: &str = "temp-";

/// Opaque message identifier.
///
/// Server ids arrive as JSON integers, client ids are strings; both are held
/// as text so the store never has to care where a message came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh client-side id, e.g. `temp-ai-<uuid>`.
    ///
    /// Backed by a v4 uuid, so a temporary id is never handed out twice.
    pub fn temporary(kind: &str) -> Self {
        Self(format!("{TEMPORARY_PREFIX}{kind}-{}", uuid::Uuid::new_v4()))
    }

    /// Whether this id was generated locally rather than assigned by the server
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Str(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => Self::from(n),
            RawId::Str(s) => Self(s),
        })
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
    System,
}

impl Sender {
    /// Get a short display label
    pub fn label(&self) -> &'static str {
        match self {
            Sender::User => "you",
            Sender::Ai => "ai",
            Sender::System => "system",
        }
    }
}

/// Kind of payload a message carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Text,
    FileRef,
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub content: String,
    #[serde(default)]
    pub content_type: ContentType,
    pub timestamp: DateTime<Utc>,
    /// Set only when the message ended in a terminal failure
    #[serde(default)]
    pub error: bool,
}

impl Message {
    /// Create a user text message with a fresh temporary id
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::temporary("user"),
            sender: Sender::User,
            content: content.into(),
            content_type: ContentType::Text,
            timestamp,
            error: false,
        }
    }

    /// Create an empty AI message to be filled by a response stream
    pub fn placeholder(timestamp: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::temporary("ai"),
            sender: Sender::Ai,
            content: String::new(),
            content_type: ContentType::Text,
            timestamp,
            error: false,
        }
    }

    /// Create a system notice that refers to an uploaded file
    pub fn file_notice(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::temporary("upload"),
            sender: Sender::System,
            content: content.into(),
            content_type: ContentType::FileRef,
            timestamp,
            error: false,
        }
    }
}

// Request/Response payloads

/// Body of `POST /chat/`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Tokens and identity returned by a successful login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: MessageId,
    pub username: String,
}

/// Body of `POST /auth/signup`
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Plain `{"msg": "..."}` acknowledgement
#[derive(Debug, Clone, Deserialize)]
pub struct ServerNotice {
    pub msg: String,
}

/// Result of `POST /files/upload`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadReceipt {
    #[serde(default)]
    pub msg: String,
    pub filename: String,
    #[serde(rename = "fileId")]
    pub file_id: MessageId,
    #[serde(rename = "chatMessageId", default)]
    pub chat_message_id: Option<MessageId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_ids_are_unique_and_prefixed() {
        let a = MessageId::temporary("ai");
        let b = MessageId::temporary("ai");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("temp-ai-"));
        assert!(a.is_temporary());
        assert!(!MessageId::from(42).is_temporary());
    }

    #[test]
    fn test_history_entry_deserializes() {
        let json = r#"{
            "id": 17,
            "sender": "ai",
            "content": "Hello there",
            "content_type": "text",
            "timestamp": "2024-05-20T10:00:00.123456Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, MessageId::from("17"));
        assert_eq!(msg.sender, Sender::Ai);
        assert_eq!(msg.content_type, ContentType::Text);
        assert!(!msg.error);
    }

    #[test]
    fn test_file_ref_and_string_id() {
        let json = r#"{
            "id": "temp-upload-1",
            "sender": "system",
            "content": "File uploaded: scan.pdf",
            "content_type": "file_ref",
            "timestamp": "2024-05-21T15:30:00Z",
            "error": true
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(msg.id.is_temporary());
        assert_eq!(msg.sender, Sender::System);
        assert_eq!(msg.content_type, ContentType::FileRef);
        assert!(msg.error);
    }

    #[test]
    fn test_message_serializes_wire_names() {
        let ts = "2024-05-20T10:00:00Z".parse().unwrap();
        let mut msg = Message::file_notice("Uploading a.png...", ts);
        msg.id = MessageId::new("x");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["id"], "x");
        assert_eq!(value["sender"], "system");
        assert_eq!(value["content_type"], "file_ref");
    }

    #[test]
    fn test_placeholder_is_empty_ai_text() {
        let msg = Message::placeholder(Utc::now());
        assert_eq!(msg.sender, Sender::Ai);
        assert!(msg.content.is_empty());
        assert!(msg.id.as_str().starts_with("temp-ai-"));
    }

    #[test]
    fn test_login_response() {
        let json = r#"{"access_token":"a","refresh_token":"r","userId":3,"username":"kim"}"#;
        let resp: LoginResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.user_id.as_str(), "3");
        assert_eq!(resp.refresh_token.as_deref(), Some("r"));
    }
}
