//! Conversation session record.

use std::time::{Duration, Instant};

/// A downstream conversation session.
///
/// Created at most once per conversation id by the session initializer; the
/// downstream owns TTL renewal on subsequent calls, so an expired record here
/// only means the registry entry is stale, not that the conversation is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    /// The conversation this session belongs to.
    pub conversation_id: String,
    /// Time-to-live granted by the downstream, in seconds.
    pub ttl_secs: u64,
    /// When the session was established.
    pub created_at: Instant,
}

impl ConversationSession {
    /// Builds a session established now.
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            ttl_secs,
            created_at: Instant::now(),
        }
    }

    /// Whether the TTL has elapsed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= Duration::from_secs(self.ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_not_expired() {
        let session = ConversationSession::new("conv_1", 3600);
        assert!(!session.is_expired());
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let session = ConversationSession::new("conv_1", 0);
        assert!(session.is_expired());
    }

    #[test]
    fn backdated_session_expires() {
        let session = ConversationSession {
            conversation_id: "conv_1".into(),
            ttl_secs: 1,
            created_at: Instant::now() - Duration::from_secs(5),
        };
        assert!(session.is_expired());
    }
}
