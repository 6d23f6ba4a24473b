use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Coach,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Coach => "coach",
        }
    }
}

/// A message sent to a coach sits in `waiting_for_coach` until the coach
/// replies; everything else is plain `sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    WaitingForCoach,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::WaitingForCoach => "waiting_for_coach",
        }
    }
}

/// One `(emoji, userId)` tally on a message. A repeated reaction from the
/// same user bumps `count` on the existing entry instead of appending a
/// second one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEntry {
    pub emoji: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub count: u32,
}
