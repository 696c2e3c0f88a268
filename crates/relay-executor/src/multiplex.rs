//! Merges a call's two feeds into one ordered event sequence.
//!
//! Every consumer downstream of this module sees a single
//! [`StreamEvent`] stream with a fixed shape: zero or more `ContentDelta`,
//! at most one `Error`, exactly one terminal `End`. Cancellation is the one
//! exception; it stops emission immediately, with no terminal frame, and
//! leaves the reader task to wind down on its own.

use std::pin::Pin;

use async_stream::stream;
use futures::Stream;
use relay_core::events::StreamEvent;
use relay_core::upstream::{self, UpstreamError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::CallFeeds;

/// Boxed event stream handed to the server.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Collapses `feeds` into one ordered [`StreamEvent`] sequence.
///
/// Rules, in precedence order each iteration:
/// 1. `cancel` fired: stop, emit nothing further.
/// 2. Transport error on the error feed: emit `Error` then `End`, stop.
/// 3. Content chunk classifying as an in-band error: emit `Error` then
///    `End`, stop; no content after an error.
/// 4. Content chunk: emit `ContentDelta`.
/// 5. Content feed closed: emit `End`, stop.
#[must_use]
pub fn multiplex(feeds: CallFeeds, cancel: CancellationToken) -> EventStream {
    let CallFeeds {
        mut content,
        mut error,
    } = feeds;

    Box::pin(stream! {
        let mut error_open = true;
        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("stream cancelled, stopping emission");
                    return;
                }

                transport = error.recv(), if error_open => {
                    match transport {
                        Some(err) => {
                            yield StreamEvent::Error {
                                error: UpstreamError::from_transport(err.to_string()),
                            };
                            yield StreamEvent::End;
                            return;
                        }
                        // Reader finished without a transport failure; keep
                        // draining content.
                        None => error_open = false,
                    }
                }

                chunk = content.recv() => {
                    match chunk {
                        Some(raw) => {
                            if let Some(err) = upstream::classify(&raw) {
                                yield StreamEvent::Error { error: err };
                                yield StreamEvent::End;
                                return;
                            }
                            if !raw.is_empty() {
                                yield StreamEvent::ContentDelta { delta: raw };
                            }
                        }
                        None => {
                            yield StreamEvent::End;
                            return;
                        }
                    }
                }
            }
        }
    })
}
