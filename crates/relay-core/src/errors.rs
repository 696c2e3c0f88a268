//! Error taxonomy for the chat orchestration subsystem.
//!
//! Transport-level failures (`UpstreamUnavailable`, `SessionInitFailed`)
//! surface to the caller as HTTP errors. In-band logical errors from the
//! downstream are *not* part of this taxonomy; they travel as
//! [`crate::events::StreamEvent::Error`] and end up embedded in a successful
//! response body, so the transport envelope never changes shape based on
//! upstream outcome.

use thiserror::Error;

/// Errors produced by the chat orchestration subsystem.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The downstream call failed at the transport level (connection reset,
    /// non-success status). Fatal for the current request; not retried.
    #[error("upstream unavailable: {message}")]
    UpstreamUnavailable {
        /// Failure description from the transport layer.
        message: String,
    },

    /// Session establishment failed. Chat cannot proceed without a session,
    /// so this is fatal for the current request.
    #[error("session init failed: {message}")]
    SessionInitFailed {
        /// Failure description.
        message: String,
    },

    /// The unique-ID allocator exhausted its retry budget.
    #[error("id allocation exhausted for {table} after {attempts} attempts")]
    IdExhausted {
        /// Target table.
        table: String,
        /// Attempts consumed.
        attempts: u32,
    },

    /// A storage operation outside the allocator's bounded loop failed.
    #[error("storage error: {message}")]
    Storage {
        /// Failure description.
        message: String,
    },
}

impl ChatError {
    /// Whether this error maps to an unavailable upstream (503 at the edge).
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::SessionInitFailed { .. }
        )
    }
}

/// Convenience result alias for chat operations.
pub type Result<T> = std::result::Result<T, ChatError>;
