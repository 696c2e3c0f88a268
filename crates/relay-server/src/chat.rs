//! The chat service: persistence, downstream call, stream driving.
//!
//! [`start_chat`] runs the synchronous part of an exchange (session, message
//! rows, downstream call) and spawns a driver task that owns the multiplexed
//! event stream. The driver forwards events to the response path through a
//! channel, accumulates the assistant's output, and settles the message rows
//! when the stream finishes. Drivers are tracked on the shutdown
//! coordinator's tracker, so draining waits for them and forcing cancels
//! them through their request tokens. A driver whose client goes away
//! cancels its own token and settles the row as cancelled.

use std::time::Instant;

use metrics::{counter, histogram};
use relay_core::events::StreamEvent;
use relay_core::request::{CallType, ChatRequest};
use relay_core::response::ChatResponse;
use relay_core::upstream::UpstreamError;
use relay_executor::dto::AgentCallRequest;
use relay_executor::multiplex;
use relay_store::conversations::ConversationRepo;
use relay_store::messages::{MessageRepo, MessageRole, MessageStatus, NewMessage};
use relay_store::{IdAllocator, Pool, StoreError};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{Span, instrument, warn};

use crate::errors::ServerError;
use crate::metrics::names;
use crate::state::AppState;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A running chat exchange. Events arrive on `events`; the driver task
/// settles persistence after the last one.
#[derive(Debug)]
pub struct ChatExchange {
    /// Resolved conversation id (allocated for new conversations).
    pub conversation_id: String,
    /// Persisted user message row id.
    pub user_message_id: String,
    /// Assistant placeholder row id.
    pub assistant_message_id: String,
    /// Ordered event feed.
    pub events: mpsc::Receiver<StreamEvent>,
}

/// Starts a chat exchange: resolves the session, persists the user message
/// and an assistant placeholder, issues the downstream call, and spawns the
/// stream driver.
#[instrument(skip_all, fields(call_type = ?req.call_type, conversation_id = tracing::field::Empty))]
pub async fn start_chat(state: &AppState, req: &ChatRequest) -> Result<ChatExchange, ServerError> {
    counter!(names::CHAT_REQUESTS_TOTAL, "call_type" => call_type_label(req.call_type))
        .increment(1);

    let session = state
        .sessions
        .ensure_session(state.executor.as_ref(), &state.pool, req)
        .await?;
    let conversation_id = session.conversation_id.clone();
    let _ = Span::current().record("conversation_id", conversation_id.as_str());

    let conn = state.pool.get().map_err(StoreError::from)?;
    let start_idx =
        ConversationRepo::reserve_message_indexes(&conn, &conversation_id, 2)
            .map_err(ServerError::from)?;

    let user_message_id = IdAllocator::allocate(&*conn, "msg", "messages", "id")
        .map_err(ServerError::from)?;
    let assistant_message_id = IdAllocator::allocate(&*conn, "msg", "messages", "id")
        .map_err(ServerError::from)?;

    MessageRepo::create(
        &conn,
        &NewMessage {
            id: &user_message_id,
            conversation_id: &conversation_id,
            reply_id: None,
            role: MessageRole::User,
            idx: start_idx,
            content: &req.query,
            status: MessageStatus::Succeeded,
            created_by: &req.user_id,
        },
    )
    .map_err(ServerError::from)?;
    MessageRepo::create(
        &conn,
        &NewMessage {
            id: &assistant_message_id,
            conversation_id: &conversation_id,
            reply_id: Some(&user_message_id),
            role: MessageRole::Assistant,
            idx: start_idx + 1,
            content: "",
            status: MessageStatus::Processing,
            created_by: &req.user_id,
        },
    )
    .map_err(ServerError::from)?;
    drop(conn);

    let call_req = AgentCallRequest::from_chat(req, &conversation_id);
    let call = match req.call_type {
        CallType::DebugChat => state.executor.debug(&call_req).await,
        _ => state.executor.call(&call_req).await,
    };
    let feeds = match call {
        Ok(feeds) => feeds,
        Err(err) => {
            // The placeholder row must not stay at processing forever.
            settle_assistant(
                &state.pool,
                &conversation_id,
                &assistant_message_id,
                "",
                MessageStatus::Failed,
            );
            return Err(err.into());
        }
    };

    let cancel = state.shutdown.request_token();
    let stream = multiplex(feeds, cancel.clone());

    let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let driver = StreamDriver {
        pool: state.pool.clone(),
        conversation_id: conversation_id.clone(),
        assistant_message_id: assistant_message_id.clone(),
        cancel,
    };
    let _ = state.shutdown.tracker().spawn(driver.run(stream, tx));

    Ok(ChatExchange {
        conversation_id,
        user_message_id,
        assistant_message_id,
        events,
    })
}

/// Folds a non-streaming exchange into a single response.
pub async fn collect_response(mut exchange: ChatExchange) -> ChatResponse {
    let mut message = String::new();
    let mut upstream_error: Option<UpstreamError> = None;
    while let Some(event) = exchange.events.recv().await {
        match event {
            StreamEvent::ContentDelta { delta } => message.push_str(&delta),
            StreamEvent::Error { error } => upstream_error = Some(error),
            StreamEvent::End => {}
        }
    }

    let mut response = ChatResponse {
        conversation_id: exchange.conversation_id,
        user_message_id: exchange.user_message_id,
        assistant_message_id: exchange.assistant_message_id,
        message,
        ext: std::collections::BTreeMap::new(),
    };
    if let Some(error) = &upstream_error {
        response.set_upstream_error(error);
    }
    response
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream driver
// ─────────────────────────────────────────────────────────────────────────────

struct StreamDriver {
    pool: Pool,
    conversation_id: String,
    assistant_message_id: String,
    cancel: CancellationToken,
}

impl StreamDriver {
    async fn run(self, mut stream: relay_executor::EventStream, tx: mpsc::Sender<StreamEvent>) {
        let started = Instant::now();
        let mut content = String::new();
        let mut errored = false;
        let mut ended = false;
        let mut receiver_gone = false;

        while let Some(event) = stream.next().await {
            match &event {
                StreamEvent::ContentDelta { delta } => content.push_str(delta),
                StreamEvent::Error { error } => {
                    errored = true;
                    counter!(
                        names::CHAT_UPSTREAM_ERRORS_TOTAL,
                        "origin" => origin_label(error)
                    )
                    .increment(1);
                }
                StreamEvent::End => ended = true,
            }
            if !receiver_gone && tx.send(event).await.is_err() {
                // Client went away; cancel so the stream winds down instead
                // of pulling from the downstream indefinitely.
                receiver_gone = true;
                self.cancel.cancel();
            }
        }

        let status = if ended {
            if errored {
                MessageStatus::Failed
            } else {
                MessageStatus::Succeeded
            }
        } else {
            counter!(names::CHAT_CANCELLED_TOTAL).increment(1);
            MessageStatus::Cancelled
        };
        histogram!(names::CHAT_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        settle_assistant(
            &self.pool,
            &self.conversation_id,
            &self.assistant_message_id,
            &content,
            status,
        );
    }
}

/// Writes the assistant row's final content and status and touches the
/// conversation. Settlement failures are logged, not propagated: by this
/// point the exchange already has its outcome.
fn settle_assistant(
    pool: &Pool,
    conversation_id: &str,
    assistant_message_id: &str,
    content: &str,
    status: MessageStatus,
) {
    let result = pool.get().map_err(StoreError::from).and_then(|conn| {
        MessageRepo::set_content(&conn, assistant_message_id, content)?;
        MessageRepo::set_status(&conn, assistant_message_id, status)?;
        ConversationRepo::touch(&conn, conversation_id)
    });
    if let Err(err) = result {
        warn!(
            conversation_id = %conversation_id,
            message_id = %assistant_message_id,
            %err,
            "failed to settle assistant message"
        );
    }
}

fn call_type_label(call_type: CallType) -> &'static str {
    match call_type {
        CallType::Chat => "chat",
        CallType::DebugChat => "debug_chat",
        CallType::ApiChat => "api_chat",
        CallType::InternalChat => "internal_chat",
    }
}

fn origin_label(error: &UpstreamError) -> &'static str {
    match error.origin {
        relay_core::upstream::UpstreamOrigin::AgentFactory => "agent_factory",
        relay_core::upstream::UpstreamOrigin::AgentExecutor => "agent_executor",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use relay_core::errors::ChatError;
    use relay_core::request::VisitorType;
    use relay_executor::dto::SessionInitRequest;
    use relay_executor::{AgentExecutor, CallFeeds, ExecutorError};
    use relay_store::messages::MessageRow;
    use relay_store::migrations::run_migrations;

    use super::*;
    use crate::metrics::detached_handle;
    use crate::settings::RelaySettings;

    /// Plays back a scripted list of chunks, then closes the feeds.
    struct ScriptedExecutor {
        chunks: Vec<String>,
        fail_call: bool,
    }

    impl ScriptedExecutor {
        fn new(chunks: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                chunks: chunks.iter().map(ToString::to_string).collect(),
                fail_call: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                chunks: Vec::new(),
                fail_call: true,
            })
        }

        fn feeds(&self) -> Result<CallFeeds, ExecutorError> {
            if self.fail_call {
                return Err(ExecutorError::Stream("connect refused".into()));
            }
            let (content_tx, content) = mpsc::channel(16);
            let (_error_tx, error) = mpsc::channel(1);
            for chunk in &self.chunks {
                content_tx.try_send(chunk.clone()).unwrap();
            }
            Ok(CallFeeds { content, error })
        }
    }

    /// Hands out feeds that stay open, exposing the content sender so a
    /// test can push chunks after the exchange has started.
    #[derive(Default)]
    struct HoldOpenExecutor {
        content_tx: parking_lot::Mutex<Option<mpsc::Sender<String>>>,
    }

    #[async_trait]
    impl AgentExecutor for HoldOpenExecutor {
        async fn call(&self, _req: &AgentCallRequest) -> Result<CallFeeds, ExecutorError> {
            let (content_tx, content) = mpsc::channel(4);
            let (_error_tx, error) = mpsc::channel(1);
            *self.content_tx.lock() = Some(content_tx);
            Ok(CallFeeds { content, error })
        }

        async fn debug(&self, req: &AgentCallRequest) -> Result<CallFeeds, ExecutorError> {
            self.call(req).await
        }

        async fn init_session(&self, _req: &SessionInitRequest) -> Result<u64, ExecutorError> {
            Ok(3600)
        }
    }

    #[async_trait]
    impl AgentExecutor for ScriptedExecutor {
        async fn call(&self, _req: &AgentCallRequest) -> Result<CallFeeds, ExecutorError> {
            self.feeds()
        }

        async fn debug(&self, _req: &AgentCallRequest) -> Result<CallFeeds, ExecutorError> {
            self.feeds()
        }

        async fn init_session(&self, _req: &SessionInitRequest) -> Result<u64, ExecutorError> {
            Ok(3600)
        }
    }

    fn test_state(executor: Arc<dyn AgentExecutor>) -> AppState {
        let pool = relay_store::new_in_memory().unwrap();
        {
            let conn = pool.get().unwrap();
            run_migrations(&conn).unwrap();
        }
        AppState::new(executor, pool, RelaySettings::default(), detached_handle())
    }

    fn request() -> ChatRequest {
        ChatRequest {
            conversation_id: String::new(),
            user_id: "u_1".into(),
            visitor_type: VisitorType::RealName,
            query: "hello there".into(),
            call_type: CallType::Chat,
            stream: false,
            history_limit: None,
        }
    }

    fn assistant_row(state: &AppState, id: &str) -> MessageRow {
        let conn = state.pool.get().unwrap();
        MessageRepo::get_by_id(&conn, id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn full_exchange_persists_both_messages() {
        let state = test_state(ScriptedExecutor::new(&["hel", "lo"]));
        let exchange = start_chat(&state, &request()).await.unwrap();
        let assistant_id = exchange.assistant_message_id.clone();

        let response = collect_response(exchange).await;
        assert_eq!(response.message, "hello");
        assert!(response.upstream_error().is_none());

        // Driver settles after the stream; wait for it.
        let _ = state.shutdown.tracker().close();
        state.shutdown.tracker().wait().await;

        let row = assistant_row(&state, &assistant_id);
        assert_eq!(row.content, "hello");
        assert_eq!(row.status, MessageStatus::Succeeded);

        let conn = state.pool.get().unwrap();
        let user_row = MessageRepo::get_by_id(&conn, &response.user_message_id)
            .unwrap()
            .unwrap();
        assert_eq!(user_row.content, "hello there");
        assert_eq!(user_row.idx, 0);
        assert_eq!(row.idx, 1);
        assert_eq!(row.reply_id.as_deref(), Some(response.user_message_id.as_str()));
    }

    #[tokio::test]
    async fn in_band_error_lands_in_ext_and_fails_the_row() {
        let state = test_state(ScriptedExecutor::new(&[
            "partial",
            r#"{"description":"quota","error_code":"E1","solution":"wait"}"#,
        ]));
        let exchange = start_chat(&state, &request()).await.unwrap();
        let assistant_id = exchange.assistant_message_id.clone();

        let response = collect_response(exchange).await;
        assert_eq!(response.message, "partial");
        let err = response.upstream_error().unwrap();
        assert_eq!(err["code"], "E1");
        assert_eq!(err["origin"], "agent_factory");

        let _ = state.shutdown.tracker().close();
        state.shutdown.tracker().wait().await;
        assert_eq!(
            assistant_row(&state, &assistant_id).status,
            MessageStatus::Failed
        );
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_upstream_unavailable() {
        let state = test_state(ScriptedExecutor::failing());
        let err = start_chat(&state, &request()).await.unwrap_err();
        assert_matches!(
            err,
            ServerError::Chat(ChatError::UpstreamUnavailable { .. })
        );
    }

    #[tokio::test]
    async fn call_failure_fails_the_placeholder_row() {
        let state = test_state(ScriptedExecutor::failing());
        let _ = start_chat(&state, &request()).await.unwrap_err();

        let conn = state.pool.get().unwrap();
        let assistant_id: String = conn
            .query_row(
                "SELECT id FROM messages WHERE role = 'assistant'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        drop(conn);
        assert_eq!(
            assistant_row(&state, &assistant_id).status,
            MessageStatus::Failed
        );
    }

    #[tokio::test]
    async fn dropped_client_cancels_the_stream() {
        let executor = Arc::new(HoldOpenExecutor::default());
        let state = test_state(executor.clone());

        let exchange = start_chat(&state, &request()).await.unwrap();
        let assistant_id = exchange.assistant_message_id.clone();
        drop(exchange);

        // The next event the driver forwards hits a closed channel; it
        // cancels its token and the stream winds down.
        let content_tx = executor.content_tx.lock().clone().unwrap();
        content_tx.send("late chunk".into()).await.unwrap();

        let _ = state.shutdown.tracker().close();
        state.shutdown.tracker().wait().await;

        assert_eq!(
            assistant_row(&state, &assistant_id).status,
            MessageStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn existing_conversation_id_is_preserved() {
        let state = test_state(ScriptedExecutor::new(&["ok"]));

        // Seed the conversation row the request refers to.
        {
            let conn = state.pool.get().unwrap();
            let _ = ConversationRepo::create(&conn, "conv_live", "t", "u_1").unwrap();
        }
        let req = ChatRequest {
            conversation_id: "conv_live".into(),
            ..request()
        };
        let exchange = start_chat(&state, &req).await.unwrap();
        assert_eq!(exchange.conversation_id, "conv_live");
        let response = collect_response(exchange).await;
        assert_eq!(response.conversation_id, "conv_live");
    }

    #[tokio::test]
    async fn forced_shutdown_marks_row_cancelled() {
        let state = test_state(ScriptedExecutor::new(&[]));

        // Feeds that never close: the driver only stops when forced.
        let (_content_tx, content) = mpsc::channel::<String>(1);
        let (_error_tx, error) = mpsc::channel(1);
        let token = state.shutdown.request_token();
        let stream = multiplex(CallFeeds { content, error }, token.clone());

        let exchange = start_chat(&state, &request()).await.unwrap();
        let assistant_id = exchange.assistant_message_id.clone();
        let (tx, _rx) = mpsc::channel(4);
        let driver = StreamDriver {
            pool: state.pool.clone(),
            conversation_id: exchange.conversation_id.clone(),
            assistant_message_id: assistant_id.clone(),
            cancel: token,
        };
        let _ = state.shutdown.tracker().spawn(driver.run(stream, tx));

        let outcome = state
            .shutdown
            .drain(std::time::Duration::from_millis(50))
            .await;
        assert_eq!(outcome, crate::shutdown::ShutdownOutcome::Forced);

        // Give the cancelled driver a beat to settle the row.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(
            assistant_row(&state, &assistant_id).status,
            MessageStatus::Cancelled
        );
    }
}
