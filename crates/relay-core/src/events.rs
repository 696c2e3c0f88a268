//! The ordered event union every downstream call collapses into.
//!
//! A chat call produces a sequence of [`StreamEvent`]s with a fixed shape:
//! zero or more `ContentDelta`, then at most one `Error`, always terminated
//! by exactly one `End`. Consumers (SSE writer, JSON assembler) rely on that
//! ordering and never see content after an error. The one exception is
//! caller cancellation, which stops emission immediately with no terminal
//! frame.

use serde::{Deserialize, Serialize};

use crate::upstream::UpstreamError;

// ─────────────────────────────────────────────────────────────────────────────
// Stream events
// ─────────────────────────────────────────────────────────────────────────────

/// A single event in a chat stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// An incremental chunk of assistant output.
    ContentDelta {
        /// The text chunk. Never empty on the wire.
        delta: String,
    },

    /// A logical error from the downstream, detected in-band. At most one
    /// per stream; no content follows it.
    Error {
        /// The classified error payload.
        error: UpstreamError,
    },

    /// Terminal marker. Exactly one per non-cancelled stream.
    End,
}

impl StreamEvent {
    /// Whether this event terminates the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End)
    }
}
