//! In-band upstream error detection.
//!
//! The downstream executor reports logical failures *inside* the content
//! feed: a chunk that parses as the structured error shape with a non-empty
//! `error_code` is an error, everything else is content. [`classify`] is the
//! single place that decision is made; it runs on every raw chunk before the
//! chunk is treated as a content delta.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Code prefix that marks an error as originating in the executor itself
/// rather than the model factory behind it.
const EXECUTOR_CODE_PREFIX: &str = "AgentExecutor.";

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Which downstream component produced an in-band error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamOrigin {
    /// The model factory behind the executor.
    AgentFactory,
    /// The agent executor itself.
    AgentExecutor,
}

/// A logical error reported in-band by the downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamError {
    /// Derived from the code prefix; not present on the wire.
    pub origin: UpstreamOrigin,
    /// Machine-readable error code. Non-empty by construction.
    pub code: String,
    /// Human-readable description.
    pub description: String,
    /// Optional structured context.
    pub details: Option<BTreeMap<String, Value>>,
    /// Suggested remediation from the downstream.
    pub solution: String,
}

/// Wire shape of an in-band error chunk.
#[derive(Debug, Deserialize)]
struct RawUpstreamError {
    #[serde(default)]
    description: String,
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    error_details: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    solution: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Decides whether a raw content chunk is an in-band error.
///
/// Returns `Some` only when the chunk parses as the structured error shape
/// *and* carries a non-empty `error_code`. Anything else (plain text,
/// arbitrary JSON, the error shape with an empty code) is content.
#[must_use]
pub fn classify(raw: &str) -> Option<UpstreamError> {
    let parsed: RawUpstreamError = serde_json::from_str(raw).ok()?;
    if parsed.error_code.is_empty() {
        return None;
    }
    let origin = if parsed.error_code.starts_with(EXECUTOR_CODE_PREFIX) {
        UpstreamOrigin::AgentExecutor
    } else {
        UpstreamOrigin::AgentFactory
    };
    Some(UpstreamError {
        origin,
        code: parsed.error_code,
        description: parsed.description,
        details: parsed.error_details,
        solution: parsed.solution,
    })
}

impl UpstreamError {
    /// Builds a synthetic error for a transport-level failure, so the stream
    /// can still carry it as an in-band event when the transport breaks
    /// mid-stream.
    #[must_use]
    pub fn from_transport(message: impl Into<String>) -> Self {
        Self {
            origin: UpstreamOrigin::AgentExecutor,
            code: "AgentExecutor.Unavailable".into(),
            description: message.into(),
            details: None,
            solution: String::new(),
        }
    }
}
