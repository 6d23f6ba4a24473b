pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

use mentor_types::models::ReactionEntry;

use crate::models::{MessageRow, NewMessage};

/// Failures at the record-store boundary. `NotFound` is separated from
/// backend errors so callers can report the two differently.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Store operations the realtime gateway depends on. [`Database`] is the
/// production implementation; gateway tests substitute an in-memory fake.
pub trait RecordStore: Send + Sync {
    /// Persist a new chat message.
    fn insert_message(&self, message: NewMessage) -> Result<(), StoreError>;

    /// Fetch one message by id.
    fn message_by_id(&self, id: &str) -> Result<MessageRow, StoreError>;

    /// Replace a message's reaction list wholesale. Last write wins.
    fn set_message_reactions(
        &self,
        id: &str,
        reactions: &[ReactionEntry],
    ) -> Result<(), StoreError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}
