//! HTTP client for the agent executor.
//!
//! A chat call answers with an SSE stream. The client checks the response
//! status before handing anything back, then spawns a reader task that owns
//! the response body and forwards each `data:` payload into a bounded
//! content channel. Transport failures mid-stream go into a separate
//! single-slot error channel; both channels close when the reader finishes.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::dto::{AgentCallRequest, SessionInitRequest, SessionInitResponse};
use crate::errors::ExecutorError;

const CONTENT_FEED_CAPACITY: usize = 64;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ─────────────────────────────────────────────────────────────────────────────
// Call feeds
// ─────────────────────────────────────────────────────────────────────────────

/// The two feeds a chat call produces.
///
/// Raw content chunks arrive on `content` (in-band errors included; the
/// multiplexer classifies them). At most one transport failure arrives on
/// `error`. Both close when the downstream stream ends.
#[derive(Debug)]
pub struct CallFeeds {
    /// Raw chunk feed.
    pub content: mpsc::Receiver<String>,
    /// Transport failure feed, at most one value.
    pub error: mpsc::Receiver<ExecutorError>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait seam
// ─────────────────────────────────────────────────────────────────────────────

/// The executor boundary the server depends on.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Runs a chat call; the answer streams back through the feeds.
    async fn call(&self, req: &AgentCallRequest) -> Result<CallFeeds, ExecutorError>;

    /// Runs a debug-console chat call.
    async fn debug(&self, req: &AgentCallRequest) -> Result<CallFeeds, ExecutorError>;

    /// Establishes a downstream session, returning the granted TTL in
    /// seconds.
    async fn init_session(&self, req: &SessionInitRequest) -> Result<u64, ExecutorError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Production executor client over HTTP.
#[derive(Debug, Clone)]
pub struct ExecutorClient {
    http: reqwest::Client,
    base_url: String,
}

impl ExecutorClient {
    /// Builds a client for the executor at `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ExecutorError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    #[instrument(skip_all, fields(conversation_id = %req.conversation_id, path = %path))]
    async fn stream_call(
        &self,
        path: &str,
        req: &AgentCallRequest,
    ) -> Result<CallFeeds, ExecutorError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("accept", "text/event-stream")
            .json(req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExecutorError::Status { status, body });
        }

        let (content_tx, content_rx) = mpsc::channel(CONTENT_FEED_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(1);

        let _ = tokio::spawn(async move {
            let mut events = Box::pin(resp.bytes_stream().eventsource());
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if content_tx.send(event.data).await.is_err() {
                            debug!("content feed dropped, stopping reader");
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = error_tx
                            .send(ExecutorError::Stream(err.to_string()))
                            .await;
                        break;
                    }
                }
            }
        });

        Ok(CallFeeds {
            content: content_rx,
            error: error_rx,
        })
    }
}

#[async_trait]
impl AgentExecutor for ExecutorClient {
    async fn call(&self, req: &AgentCallRequest) -> Result<CallFeeds, ExecutorError> {
        self.stream_call("/api/v1/agent/call", req).await
    }

    async fn debug(&self, req: &AgentCallRequest) -> Result<CallFeeds, ExecutorError> {
        self.stream_call("/api/v1/agent/debug", req).await
    }

    #[instrument(skip_all, fields(conversation_id = %req.conversation_id))]
    async fn init_session(&self, req: &SessionInitRequest) -> Result<u64, ExecutorError> {
        let url = format!("{}/api/v1/agent/session/init", self.base_url);
        let resp = self.http.post(&url).json(req).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExecutorError::Status { status, body });
        }

        let parsed: SessionInitResponse = resp.json().await?;
        debug!(ttl = parsed.ttl, "session initialized");
        Ok(parsed.ttl)
    }
}
