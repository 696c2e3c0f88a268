//! Time-ordered identifier generation.

use uuid::Uuid;

/// Generates a prefixed, time-ordered identifier: `{prefix}_{uuidv7}`.
///
/// UUIDv7 keeps ids roughly sortable by creation time while staying
/// collision-resistant; callers that need a uniqueness guarantee still go
/// through the store's allocator, which probes for collisions.
#[must_use]
pub fn generate(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::now_v7())
}
