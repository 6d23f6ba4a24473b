use anyhow::Result;
use rusqlite::Connection;
use tracing::warn;

use mentor_types::models::ReactionEntry;

use crate::models::{ChatRow, MessageRow, NewMessage, UserRow};
use crate::{Database, RecordStore, StoreError};

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, display_name: &str, role: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, display_name, role) VALUES (?1, ?2, ?3)",
                (id, display_name, role),
            )?;
            Ok(())
        })
    }

    pub fn user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Chats --

    pub fn create_chat(&self, id: &str, participant_ids: &[String]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO chats (id) VALUES (?1)", [id])?;
            for user_id in participant_ids {
                conn.execute(
                    "INSERT INTO chat_participants (chat_id, user_id) VALUES (?1, ?2)",
                    (id, user_id),
                )?;
            }
            Ok(())
        })
    }

    pub fn chats_for_user(&self, user_id: &str) -> Result<Vec<ChatRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.created_at
                 FROM chats c
                 JOIN chat_participants cp ON cp.chat_id = c.id
                 WHERE cp.user_id = ?1
                 ORDER BY c.created_at DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ChatRow {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Batch-fetch participants for a set of chat ids.
    /// Returns (chat_id, user_id) pairs.
    pub fn participants_for_chats(&self, chat_ids: &[String]) -> Result<Vec<(String, String)>> {
        if chat_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=chat_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT chat_id, user_id FROM chat_participants WHERE chat_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = chat_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Roles of every participant in a chat other than `user_id`.
    pub fn chat_partner_roles(&self, chat_id: &str, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.role
                 FROM chat_participants cp
                 JOIN users u ON u.id = cp.user_id
                 WHERE cp.chat_id = ?1 AND cp.user_id != ?2",
            )?;

            let rows = stmt
                .query_map((chat_id, user_id), |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    pub fn messages_for_chat(&self, chat_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, author_id, content, status, reactions, created_at
                 FROM messages
                 WHERE chat_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;

            let rows = stmt
                .query_map([chat_id], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

impl RecordStore for Database {
    fn insert_message(&self, message: NewMessage) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, chat_id, author_id, content, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    message.id,
                    message.chat_id,
                    message.author_id,
                    message.content,
                    message.status.as_str(),
                ],
            )?;
            Ok(())
        })
        .map_err(StoreError::Backend)
    }

    fn message_by_id(&self, id: &str) -> Result<MessageRow, StoreError> {
        let row = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, chat_id, author_id, content, status, reactions, created_at
                     FROM messages
                     WHERE id = ?1",
                )?;
                stmt.query_row([id], map_message_row).optional()
            })
            .map_err(StoreError::Backend)?;

        row.ok_or(StoreError::NotFound)
    }

    fn set_message_reactions(
        &self,
        id: &str,
        reactions: &[ReactionEntry],
    ) -> Result<(), StoreError> {
        let payload =
            serde_json::to_string(reactions).map_err(|e| StoreError::Backend(e.into()))?;

        let updated = self
            .with_conn(|conn| {
                let n = conn.execute(
                    "UPDATE messages SET reactions = ?1 WHERE id = ?2",
                    rusqlite::params![payload, id],
                )?;
                Ok(n)
            })
            .map_err(StoreError::Backend)?;

        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn map_message_row(row: &rusqlite::Row) -> rusqlite::Result<MessageRow> {
    let id: String = row.get(0)?;
    let reactions_json: String = row.get(5)?;
    let reactions = serde_json::from_str(&reactions_json).unwrap_or_else(|e| {
        warn!("Corrupt reactions on message '{}': {}", id, e);
        Vec::new()
    });

    Ok(MessageRow {
        id,
        chat_id: row.get(1)?,
        author_id: row.get(2)?,
        content: row.get(3)?,
        status: row.get(4)?,
        reactions,
        created_at: row.get(6)?,
    })
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, display_name, role, created_at FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                display_name: row.get(1)?,
                role: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
