//! Conversation session initialization.
//!
//! An empty conversation id on a chat request means "start a new
//! conversation": allocate an id, establish a downstream session exactly
//! once, persist the conversation row, remember the session. A non-empty id
//! costs zero downstream calls; TTL renewal on continued conversations is
//! the downstream's job, the registry only exists to avoid re-initializing.

use std::collections::HashMap;

use metrics::counter;
use parking_lot::Mutex;
use relay_core::errors::ChatError;
use relay_core::request::ChatRequest;
use relay_core::session::ConversationSession;
use relay_executor::AgentExecutor;
use relay_executor::dto::SessionInitRequest;
use relay_store::conversations::{ConversationRepo, title_from_query};
use relay_store::{IdAllocator, Pool, StoreError};
use tracing::{info, instrument};

use crate::errors::ServerError;
use crate::metrics::names;

/// In-memory session registry with at-most-once downstream init.
pub struct SessionInitializer {
    sessions: Mutex<HashMap<String, ConversationSession>>,
    default_ttl_secs: u64,
}

impl SessionInitializer {
    /// Creates an empty registry. `default_ttl_secs` is assumed for
    /// conversations the registry has no record of.
    #[must_use]
    pub fn new(default_ttl_secs: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            default_ttl_secs,
        }
    }

    /// Resolves the session for a chat request.
    ///
    /// Empty conversation id: allocate an id, init the downstream session,
    /// create the conversation row, register. Non-empty id: answer from the
    /// registry (pruning an expired entry) without calling downstream.
    ///
    /// Each storage step checks out its own connection; none may live
    /// across the downstream await or the caller's future stops being
    /// `Send`.
    #[instrument(skip_all, fields(new = req.is_new_conversation()))]
    pub async fn ensure_session(
        &self,
        executor: &dyn AgentExecutor,
        pool: &Pool,
        req: &ChatRequest,
    ) -> Result<ConversationSession, ServerError> {
        if !req.is_new_conversation() {
            return Ok(self.known_session(&req.conversation_id));
        }

        let id = {
            let conn = pool.get().map_err(StoreError::from)?;
            IdAllocator::allocate(&*conn, "conv", "conversations", "id")
                .map_err(ServerError::from)?
        };

        let ttl = executor
            .init_session(&SessionInitRequest {
                conversation_id: id.clone(),
                user_id: req.user_id.clone(),
            })
            .await
            .map_err(|err| {
                ServerError::Chat(ChatError::SessionInitFailed {
                    message: err.to_string(),
                })
            })?;

        let title = title_from_query(&req.query);
        {
            let conn = pool.get().map_err(StoreError::from)?;
            let _ = ConversationRepo::create(&conn, &id, &title, &req.user_id)
                .map_err(ServerError::from)?;
        }

        let session = ConversationSession::new(id.clone(), ttl);
        let _ = self.sessions.lock().insert(id.clone(), session.clone());
        counter!(names::SESSIONS_INITIALIZED_TOTAL).increment(1);
        info!(conversation_id = %id, ttl_secs = ttl, "session initialized");
        Ok(session)
    }

    fn known_session(&self, conversation_id: &str) -> ConversationSession {
        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.get(conversation_id) {
            if existing.is_expired() {
                let _ = sessions.remove(conversation_id);
            } else {
                return existing.clone();
            }
        }
        ConversationSession::new(conversation_id.to_string(), self.default_ttl_secs)
    }

    /// Registered, unexpired session count.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
