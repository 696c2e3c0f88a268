//! Server-sent-events rendering of a chat exchange.
//!
//! Each [`StreamEvent`] becomes one `data:` frame holding the event's JSON.
//! The `End` event is the literal final frame; the connection closes right
//! after it because the driver drops its sender once the stream finishes.

use std::convert::Infallible;

use axum::response::Sse;
use axum::response::sse::Event;
use futures::Stream;
use relay_core::events::StreamEvent;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::chat::ChatExchange;

/// Renders an exchange as an SSE response.
pub fn sse_response(exchange: ChatExchange) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = ReceiverStream::new(exchange.events).map(|event| Ok(frame(&event)));
    Sse::new(frames)
}

fn frame(event: &StreamEvent) -> Event {
    let data = serde_json::to_string(event)
        .unwrap_or_else(|_| r#"{"type":"end"}"#.to_string());
    Event::default().data(data)
}
