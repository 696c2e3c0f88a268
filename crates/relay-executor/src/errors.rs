//! Executor client errors.

use thiserror::Error;

/// Transport-level failures talking to the agent executor.
///
/// Logical errors are not represented here; the downstream reports those
/// in-band on the content feed and the classifier picks them up.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The HTTP request could not be sent or the connection broke.
    #[error("executor request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The executor answered with a non-success status.
    #[error("executor returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: reqwest::StatusCode,
        /// Response body, best effort.
        body: String,
    },

    /// The SSE stream broke mid-call.
    #[error("executor stream error: {0}")]
    Stream(String),
}
