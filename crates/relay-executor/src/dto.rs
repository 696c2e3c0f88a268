//! Wire types for the agent-executor API.

use relay_core::request::{CallType, ChatRequest, VisitorType};
use serde::{Deserialize, Serialize};

/// Body of a chat call to the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCallRequest {
    /// Conversation the call belongs to. Always non-empty; session init
    /// happens before the first call.
    pub conversation_id: String,
    /// Caller identity.
    pub user_id: String,
    /// Caller classification.
    pub visitor_type: VisitorType,
    /// The prompt payload.
    pub query: String,
    /// Entry point discriminator; selects the agent configuration downstream.
    pub call_type: CallType,
    /// Cap on prior history the executor should load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<u32>,
}

impl AgentCallRequest {
    /// Builds the downstream call body from a chat request and the resolved
    /// conversation id.
    #[must_use]
    pub fn from_chat(req: &ChatRequest, conversation_id: &str) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            user_id: req.user_id.clone(),
            visitor_type: req.visitor_type,
            query: req.query.clone(),
            call_type: req.call_type,
            history_limit: req.history_limit,
        }
    }
}

/// Body of a session-init call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInitRequest {
    /// The locally allocated conversation id the session is keyed on.
    pub conversation_id: String,
    /// Caller identity.
    pub user_id: String,
}

/// Executor's answer to session init: the TTL it granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInitResponse {
    /// Session time-to-live in seconds.
    pub ttl: u64,
}
