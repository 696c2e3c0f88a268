//! Chat request value objects.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Who is making the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitorType {
    /// An authenticated, named user.
    RealName,
    /// An anonymous visitor.
    Anonymous,
    /// A machine caller (service-to-service).
    Application,
}

/// Which entry point the call arrived through. Forwarded downstream so the
/// executor can pick the matching agent configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    /// Interactive product chat.
    Chat,
    /// Debug console chat (bypasses conversation persistence downstream).
    DebugChat,
    /// External API chat.
    ApiChat,
    /// Internal service-to-service chat.
    InternalChat,
}

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// A chat invocation.
///
/// An empty `conversation_id` asks the service to start a new conversation;
/// once assigned, the id never changes for the lifetime of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation to continue, or empty to start a new one.
    #[serde(default)]
    pub conversation_id: String,
    /// Caller identity.
    pub user_id: String,
    /// Caller classification.
    pub visitor_type: VisitorType,
    /// The prompt payload.
    pub query: String,
    /// Entry point discriminator.
    pub call_type: CallType,
    /// `true` for an SSE response, `false` for a single JSON body.
    #[serde(default)]
    pub stream: bool,
    /// Cap on how much prior history the downstream should load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<u32>,
}

impl ChatRequest {
    /// Whether this request starts a new conversation.
    #[must_use]
    pub fn is_new_conversation(&self) -> bool {
        self.conversation_id.is_empty()
    }
}
