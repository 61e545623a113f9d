//! Conversation event types

use chatline_api::MessageId;
use serde::{Deserialize, Serialize};

use crate::session::SessionState;

/// Events emitted while a response streams into the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// The user message and placeholder were appended; the request is opening
    SessionStart { placeholder_id: MessageId },

    /// A fragment arrived; `delta` is the new text, `content` the whole buffer
    SessionUpdate {
        placeholder_id: MessageId,
        delta: String,
        content: String,
    },

    /// The session reached a terminal state
    SessionEnd {
        placeholder_id: MessageId,
        state: SessionState,
        content: String,
    },
}

impl ConversationEvent {
    /// Placeholder the event refers to
    pub fn placeholder_id(&self) -> &MessageId {
        match self {
            ConversationEvent::SessionStart { placeholder_id }
            | ConversationEvent::SessionUpdate { placeholder_id, .. }
            | ConversationEvent::SessionEnd { placeholder_id, .. } => placeholder_id,
        }
    }

    /// Check if this is a terminal event
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationEvent::SessionEnd { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = ConversationEvent::SessionEnd {
            placeholder_id: MessageId::new("temp-ai-1"),
            state: SessionState::Failed,
            content: "[Error: Request aborted]".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "session_end");
        assert_eq!(value["state"], "failed");
        assert_eq!(value["placeholder_id"], "temp-ai-1");
        assert!(event.is_terminal());

        let back: ConversationEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back.placeholder_id().as_str(), "temp-ai-1");
    }
}
