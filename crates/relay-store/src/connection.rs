//! Connection pooling.

use std::path::PathBuf;

use r2d2_sqlite::SqliteConnectionManager;

use crate::errors::StoreError;

/// Pool alias used throughout the workspace.
pub type Pool = r2d2::Pool<SqliteConnectionManager>;

/// Pragmas applied to every pooled connection.
const CONN_PRAGMAS: &str = "PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Database file path. `None` selects an in-memory database.
    pub path: Option<PathBuf>,
    /// Maximum pooled connections.
    pub max_connections: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 8,
        }
    }
}

/// Builds a connection pool for the configured database.
///
/// In-memory databases are pinned to a single connection so every checkout
/// sees the same data.
pub fn new_pool(config: &ConnectionConfig) -> Result<Pool, StoreError> {
    let (manager, max) = match &config.path {
        Some(path) => (
            SqliteConnectionManager::file(path),
            config.max_connections,
        ),
        None => (SqliteConnectionManager::memory(), 1),
    };
    let manager = manager.with_init(|conn| conn.execute_batch(CONN_PRAGMAS));
    let pool = r2d2::Pool::builder().max_size(max).build(manager)?;
    Ok(pool)
}

/// Builds a single-connection in-memory pool. Test and tooling convenience.
pub fn new_in_memory() -> Result<Pool, StoreError> {
    new_pool(&ConnectionConfig::default())
}
