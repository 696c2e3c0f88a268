//! Router assembly and the chat handler.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_core::request::ChatRequest;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::ServerError;
use crate::state::AppState;
use crate::{chat, health, metrics, sse};

/// Builds the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/chat", post(chat_handler))
        .route("/ready", get(health::ready))
        .route("/alive", get(health::alive))
        .route("/metrics", get(metrics::render))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `POST /api/v1/chat`: JSON body in; JSON or SSE out depending on
/// `stream`.
async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ServerError> {
    let exchange = chat::start_chat(&state, &req).await?;
    if req.stream {
        Ok(sse::sse_response(exchange).into_response())
    } else {
        Ok(Json(chat::collect_response(exchange).await).into_response())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use relay_executor::dto::{AgentCallRequest, SessionInitRequest};
    use relay_executor::{AgentExecutor, CallFeeds, ExecutorError};
    use relay_store::migrations::run_migrations;
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::metrics::detached_handle;
    use crate::settings::RelaySettings;

    struct ScriptedExecutor {
        chunks: Vec<String>,
        unavailable: bool,
    }

    #[async_trait]
    impl AgentExecutor for ScriptedExecutor {
        async fn call(&self, _req: &AgentCallRequest) -> Result<CallFeeds, ExecutorError> {
            if self.unavailable {
                return Err(ExecutorError::Stream("refused".into()));
            }
            let (content_tx, content) = mpsc::channel(16);
            let (_error_tx, error) = mpsc::channel(1);
            for chunk in &self.chunks {
                content_tx.try_send(chunk.clone()).unwrap();
            }
            Ok(CallFeeds { content, error })
        }

        async fn debug(&self, req: &AgentCallRequest) -> Result<CallFeeds, ExecutorError> {
            self.call(req).await
        }

        async fn init_session(&self, _req: &SessionInitRequest) -> Result<u64, ExecutorError> {
            if self.unavailable {
                return Err(ExecutorError::Stream("refused".into()));
            }
            Ok(3600)
        }
    }

    fn app(chunks: &[&str], unavailable: bool) -> Router {
        let executor = Arc::new(ScriptedExecutor {
            chunks: chunks.iter().map(ToString::to_string).collect(),
            unavailable,
        });
        let pool = relay_store::new_in_memory().unwrap();
        {
            let conn = pool.get().unwrap();
            run_migrations(&conn).unwrap();
        }
        router(AppState::new(
            executor,
            pool,
            RelaySettings::default(),
            detached_handle(),
        ))
    }

    fn chat_request(stream: bool) -> Request<Body> {
        let body = serde_json::json!({
            "conversation_id": "",
            "user_id": "u_1",
            "visitor_type": "application",
            "query": "hello",
            "call_type": "api_chat",
            "stream": stream,
        });
        Request::builder()
            .method("POST")
            .uri("/api/v1/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn chat_embeds_upstream_error_in_200_body() {
        let app = app(
            &["hello", r#"{"description":"bad","error_code":"E1","solution":""}"#],
            false,
        );
        let response = app.oneshot(chat_request(false)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["message"], "hello");
        assert_eq!(json["ext"]["upstream_error"]["origin"], "agent_factory");
        assert_eq!(json["ext"]["upstream_error"]["code"], "E1");
        assert!(json["conversation_id"].as_str().unwrap().starts_with("conv_"));
    }

    #[tokio::test]
    async fn clean_chat_has_no_ext() {
        let app = app(&["hi ", "there"], false);
        let response = app.oneshot(chat_request(false)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["message"], "hi there");
        assert!(json.get("ext").is_none());
    }

    #[tokio::test]
    async fn streaming_chat_emits_sse_frames_ending_with_end() {
        let app = app(&["hi"], false);
        let response = app.oneshot(chat_request(true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains(r#"data: {"type":"content_delta","delta":"hi"}"#));
        assert!(body.trim_end().ends_with(r#"data: {"type":"end"}"#));
    }

    #[tokio::test]
    async fn unavailable_executor_is_503() {
        let app = app(&[], true);
        let response = app.oneshot(chat_request(false)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("session init failed"));
    }

    #[tokio::test]
    async fn health_endpoints_ignore_executor_state() {
        for path in ["/ready", "/alive"] {
            let app = app(&[], true);
            let response = app
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path}");
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            assert_eq!(bytes.as_ref(), b"ok" as &[u8]);
        }
    }

    #[tokio::test]
    async fn metrics_endpoint_renders() {
        let app = app(&[], false);
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
