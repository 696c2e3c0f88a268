//! Schema migrations.

use rusqlite::Connection;

use crate::errors::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS conversations (
    id            TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    created_by    TEXT NOT NULL,
    message_index INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id),
    reply_id        TEXT,
    role            TEXT NOT NULL,
    idx             INTEGER NOT NULL,
    content         TEXT NOT NULL,
    status          TEXT NOT NULL,
    created_by      TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(conversation_id, idx);
";

/// Applies the schema. Idempotent; runs at startup on one connection before
/// the pool is handed out.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
