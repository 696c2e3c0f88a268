//! Conversation repository.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::StoreError;

/// Maximum characters of the opening query used as the conversation title.
const TITLE_MAX_CHARS: usize = 50;

/// A row in `conversations`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRow {
    /// Primary key, `conv_` prefixed.
    pub id: String,
    /// Derived from the opening query.
    pub title: String,
    /// User who started the conversation.
    pub created_by: String,
    /// Next free message index.
    pub message_index: i64,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 last-activity timestamp.
    pub updated_at: String,
}

/// Derives a conversation title from the opening query.
#[must_use]
pub fn title_from_query(query: &str) -> String {
    query.chars().take(TITLE_MAX_CHARS).collect()
}

/// Stateless conversation repository. All methods take `&Connection`.
pub struct ConversationRepo;

impl ConversationRepo {
    /// Inserts a new conversation with a zero message index.
    pub fn create(
        conn: &Connection,
        id: &str,
        title: &str,
        created_by: &str,
    ) -> Result<ConversationRow, StoreError> {
        let now = Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO conversations (id, title, created_by, message_index, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?4)",
            params![id, title, created_by, now],
        )?;
        Ok(ConversationRow {
            id: id.to_string(),
            title: title.to_string(),
            created_by: created_by.to_string(),
            message_index: 0,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Fetches a conversation by id.
    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<ConversationRow>, StoreError> {
        let row = conn
            .query_row(
                "SELECT id, title, created_by, message_index, created_at, updated_at
                 FROM conversations WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ConversationRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        created_by: row.get(2)?,
                        message_index: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Whether a conversation exists.
    pub fn exists(conn: &Connection, id: &str) -> Result<bool, StoreError> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM conversations WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Bumps `updated_at` to now.
    pub fn touch(conn: &Connection, id: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let changed = conn.execute(
            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
            params![id, now],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("conversation {id}")));
        }
        Ok(())
    }

    /// Reserves `count` consecutive message indexes and returns the first.
    ///
    /// A chat exchange reserves two: the user message and the assistant
    /// placeholder.
    pub fn reserve_message_indexes(
        conn: &Connection,
        id: &str,
        count: i64,
    ) -> Result<i64, StoreError> {
        let start: i64 = conn
            .query_row(
                "SELECT message_index FROM conversations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("conversation {id}")))?;
        let _ = conn.execute(
            "UPDATE conversations SET message_index = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, start + count, Utc::now().to_rfc3339()],
        )?;
        Ok(start)
    }
}
