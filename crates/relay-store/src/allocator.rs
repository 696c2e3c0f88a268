//! Bounded-retry unique-ID allocator.
//!
//! Identifiers are UUIDv7-based, so collisions are already vanishingly rare.
//! The allocator still probes for existence before handing an id out: it
//! generates a candidate, asks an [`ExistenceProbe`] whether the id is taken,
//! and retries on collision. The loop is strictly bounded; after
//! [`MAX_ATTEMPTS`] it gives up with [`StoreError::IdExhausted`]. Probe
//! failures consume an attempt like a collision does, so a broken probe
//! cannot spin the loop forever.
//!
//! The probe is advisory. Callers keep a `UNIQUE` / primary-key constraint on
//! the column as the authoritative backstop.

use rusqlite::Connection;
use tracing::warn;

use crate::errors::StoreError;

/// Retry budget per allocation.
pub const MAX_ATTEMPTS: u32 = 50;

// ─────────────────────────────────────────────────────────────────────────────
// Probe
// ─────────────────────────────────────────────────────────────────────────────

/// Answers "is this id already taken?".
///
/// Implemented over `&Connection` for production; tests inject counting or
/// always-colliding probes.
pub trait ExistenceProbe {
    /// Whether `id` already exists in `table.column`.
    fn exists(&self, table: &str, column: &str, id: &str) -> Result<bool, StoreError>;
}

impl ExistenceProbe for Connection {
    fn exists(&self, table: &str, column: &str, id: &str) -> Result<bool, StoreError> {
        validate_identifier(table)?;
        validate_identifier(column)?;
        // Identifiers cannot be bound parameters; both are validated above.
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE {column} = ?1)");
        let taken: bool = self.query_row(&sql, [id], |row| row.get(0))?;
        Ok(taken)
    }
}

fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Allocator
// ─────────────────────────────────────────────────────────────────────────────

/// Allocates prefixed unique identifiers.
pub struct IdAllocator;

impl IdAllocator {
    /// Returns an id of the form `{prefix}_{uuidv7}` that the probe reports
    /// as free, or [`StoreError::IdExhausted`] once the retry budget is
    /// spent.
    pub fn allocate(
        probe: &dyn ExistenceProbe,
        prefix: &str,
        table: &str,
        column: &str,
    ) -> Result<String, StoreError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let candidate = relay_core::ids::generate(prefix);
            match probe.exists(table, column, &candidate) {
                Ok(false) => return Ok(candidate),
                Ok(true) => {
                    warn!(table, attempt, "id collision, retrying");
                }
                Err(err) => {
                    warn!(table, attempt, %err, "existence probe failed, retrying");
                }
            }
        }
        Err(StoreError::IdExhausted {
            table: table.to_string(),
            attempts: MAX_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use parking_lot::Mutex;

    use super::*;
    use crate::migrations::run_migrations;

    /// Reports "taken" for the first `collisions` calls, then "free".
    struct CountingProbe {
        collisions: u32,
        calls: Mutex<u32>,
    }

    impl CountingProbe {
        fn new(collisions: u32) -> Self {
            Self {
                collisions,
                calls: Mutex::new(0),
            }
        }
    }

    impl ExistenceProbe for CountingProbe {
        fn exists(&self, _table: &str, _column: &str, _id: &str) -> Result<bool, StoreError> {
            let mut calls = self.calls.lock();
            *calls += 1;
            Ok(*calls <= self.collisions)
        }
    }

    struct FailingProbe;

    impl ExistenceProbe for FailingProbe {
        fn exists(&self, _table: &str, _column: &str, _id: &str) -> Result<bool, StoreError> {
            Err(StoreError::NotFound("probe offline".into()))
        }
    }

    #[test]
    fn allocates_after_k_collisions() {
        let probe = CountingProbe::new(3);
        let id = IdAllocator::allocate(&probe, "conv", "conversations", "id").unwrap();
        assert!(id.starts_with("conv_"));
        assert_eq!(*probe.calls.lock(), 4);
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let probe = CountingProbe::new(u32::MAX);
        let err = IdAllocator::allocate(&probe, "conv", "conversations", "id").unwrap_err();
        assert_matches!(
            err,
            StoreError::IdExhausted { attempts, .. } if attempts == MAX_ATTEMPTS
        );
        assert_eq!(*probe.calls.lock(), MAX_ATTEMPTS);
    }

    #[test]
    fn probe_errors_fold_into_exhaustion() {
        let err = IdAllocator::allocate(&FailingProbe, "msg", "messages", "id").unwrap_err();
        assert_matches!(err, StoreError::IdExhausted { .. });
    }

    #[test]
    fn concurrent_callers_get_distinct_ids() {
        let probe = Arc::new(CountingProbe::new(5));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let probe = Arc::clone(&probe);
            handles.push(std::thread::spawn(move || {
                IdAllocator::allocate(probe.as_ref(), "msg", "messages", "id").unwrap()
            }));
        }
        let mut ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn connection_probe_sees_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO conversations (id, title, created_by, message_index, created_at, updated_at)
             VALUES ('conv_taken', 't', 'u', 0, 'now', 'now')",
            [],
        )
        .unwrap();
        assert!(conn.exists("conversations", "id", "conv_taken").unwrap());
        assert!(!conn.exists("conversations", "id", "conv_free").unwrap());
    }

    #[test]
    fn rejects_bad_identifiers() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.exists("conversations; DROP TABLE x", "id", "a").unwrap_err();
        assert_matches!(err, StoreError::InvalidIdentifier(_));
        let err = conn.exists("conversations", "id = 1 --", "a").unwrap_err();
        assert_matches!(err, StoreError::InvalidIdentifier(_));
    }
}
