//! Message repository.

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::StoreError;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    /// The human (or machine caller).
    User,
    /// The downstream agent.
    Assistant,
}

impl MessageRole {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// Message lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    /// Assistant placeholder while the downstream call runs.
    Processing,
    /// Stream completed normally.
    Succeeded,
    /// Stream ended with an in-band or transport error.
    Failed,
    /// Caller cancelled or the server forced shutdown mid-stream.
    Cancelled,
}

impl MessageStatus {
    /// Storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(Self::Processing),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A row in `messages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    /// Primary key, `msg_` prefixed.
    pub id: String,
    /// Owning conversation.
    pub conversation_id: String,
    /// For assistant rows, the user message being answered.
    pub reply_id: Option<String>,
    /// Author role.
    pub role: MessageRole,
    /// Position within the conversation.
    pub idx: i64,
    /// Message body. Empty while `Processing`.
    pub content: String,
    /// Lifecycle status.
    pub status: MessageStatus,
    /// Caller identity.
    pub created_by: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 last-update timestamp.
    pub updated_at: String,
}

/// Fields for inserting a message.
#[derive(Debug)]
pub struct NewMessage<'a> {
    /// Primary key.
    pub id: &'a str,
    /// Owning conversation.
    pub conversation_id: &'a str,
    /// For assistant rows, the user message being answered.
    pub reply_id: Option<&'a str>,
    /// Author role.
    pub role: MessageRole,
    /// Position within the conversation.
    pub idx: i64,
    /// Message body.
    pub content: &'a str,
    /// Initial status.
    pub status: MessageStatus,
    /// Caller identity.
    pub created_by: &'a str,
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository
// ─────────────────────────────────────────────────────────────────────────────

/// Stateless message repository. All methods take `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Inserts a message row.
    pub fn create(conn: &Connection, msg: &NewMessage<'_>) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let _ = conn.execute(
            "INSERT INTO messages (id, conversation_id, reply_id, role, idx, content, status, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                msg.id,
                msg.conversation_id,
                msg.reply_id,
                msg.role.as_str(),
                msg.idx,
                msg.content,
                msg.status.as_str(),
                msg.created_by,
                now,
            ],
        )?;
        Ok(())
    }

    /// Fetches a message by id.
    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<MessageRow>, StoreError> {
        let row = conn
            .query_row(
                "SELECT id, conversation_id, reply_id, role, idx, content, status, created_by, created_at, updated_at
                 FROM messages WHERE id = ?1",
                params![id],
                |row| {
                    let role: String = row.get(3)?;
                    let status: String = row.get(6)?;
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        reply_id: row.get(2)?,
                        role: MessageRole::parse(&role).ok_or_else(|| {
                            rusqlite::Error::FromSqlConversionFailure(
                                3,
                                Type::Text,
                                format!("unknown role {role}").into(),
                            )
                        })?,
                        idx: row.get(4)?,
                        content: row.get(5)?,
                        status: MessageStatus::parse(&status).ok_or_else(|| {
                            rusqlite::Error::FromSqlConversionFailure(
                                6,
                                Type::Text,
                                format!("unknown status {status}").into(),
                            )
                        })?,
                        created_by: row.get(7)?,
                        created_at: row.get(8)?,
                        updated_at: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Updates a message's status.
    pub fn set_status(conn: &Connection, id: &str, status: MessageStatus) -> Result<(), StoreError> {
        let changed = conn.execute(
            "UPDATE messages SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("message {id}")));
        }
        Ok(())
    }

    /// Replaces a message's content.
    pub fn set_content(conn: &Connection, id: &str, content: &str) -> Result<(), StoreError> {
        let changed = conn.execute(
            "UPDATE messages SET content = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, content, Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("message {id}")));
        }
        Ok(())
    }
}
