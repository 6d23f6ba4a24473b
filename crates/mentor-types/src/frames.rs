use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{MessageStatus, ReactionEntry};

/// Frames received from clients over the realtime channel, classified once
/// at the boundary by their `type` discriminator.
///
/// Anything without a recognized `type` (including frames carrying no
/// `type` at all) is a chat message; its raw JSON is retained so the echo
/// goes out exactly as it came in.
#[derive(Debug, Clone)]
pub enum ClientFrame {
    Reaction(ReactionFrame),
    Typing(TypingKind, TypingFrame),
    Chat(Value),
}

impl ClientFrame {
    /// Classify one inbound text frame. `Err` means the text was not valid
    /// JSON (or a known kind carried wrongly-typed fields); unknown `type`
    /// values fall through to [`ClientFrame::Chat`].
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let frame = match kind.as_str() {
            "reaction" => Self::Reaction(serde_json::from_value(value)?),
            "typing_started" => Self::Typing(TypingKind::Started, serde_json::from_value(value)?),
            "typing_stopped" => Self::Typing(TypingKind::Stopped, serde_json::from_value(value)?),
            _ => Self::Chat(value),
        };

        Ok(frame)
    }
}

/// A `type: "reaction"` frame. Fields are optional at the wire level; the
/// gateway rejects frames missing what the merge needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionFrame {
    #[serde(rename = "messageId")]
    pub message_id: Option<String>,
    pub reaction: Option<String>,
    #[serde(rename = "senderId")]
    pub sender_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingKind {
    Started,
    Stopped,
}

/// A `typing_started` / `typing_stopped` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct TypingFrame {
    #[serde(rename = "senderId")]
    pub sender_id: Option<String>,
    pub chat_id: Option<String>,
}

/// Frames the gateway emits. Chat echoes are not represented here: they go
/// out as the verbatim inbound text, never re-serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "reactionUpdate")]
    ReactionUpdate {
        #[serde(rename = "messageId")]
        message_id: String,
        reactions: Vec<ReactionEntry>,
    },

    #[serde(rename = "typing_started")]
    TypingStarted {
        #[serde(rename = "senderId")]
        sender_id: String,
        chat_id: String,
    },

    #[serde(rename = "typing_stopped")]
    TypingStopped {
        #[serde(rename = "senderId")]
        sender_id: String,
        chat_id: String,
    },

    /// A message created through the REST send path, pushed to all
    /// connected clients.
    #[serde(rename = "message")]
    Message {
        id: Uuid,
        chat_id: Uuid,
        author_id: Uuid,
        content: String,
        status: MessageStatus,
        reactions: Vec<ReactionEntry>,
        created_at: DateTime<Utc>,
    },
}
