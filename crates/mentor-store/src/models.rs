/// Database row types that map directly to SQLite rows.
/// Distinct from mentor-types API models to keep the store layer independent.
use mentor_types::models::{MessageStatus, ReactionEntry};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub display_name: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ChatRow {
    pub id: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub author_id: String,
    pub content: String,
    pub status: String,
    pub reactions: Vec<ReactionEntry>,
    pub created_at: String,
}

/// Fields for a message insert. The id and status are always supplied by
/// the server; the rest come from the caller and may be absent, in which
/// case the insert fails on the NOT NULL constraints and the caller reports
/// a store failure.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: String,
    pub chat_id: Option<String>,
    pub author_id: Option<String>,
    pub content: Option<String>,
    pub status: MessageStatus,
}
