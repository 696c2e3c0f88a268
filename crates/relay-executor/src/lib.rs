//! # relay-executor
//!
//! Client for the downstream agent executor and the stream multiplexer:
//!
//! - **Client**: [`client::ExecutorClient`] over reqwest + SSE; exposes chat
//!   calls as a pair of feeds ([`client::CallFeeds`]: content chunks and at
//!   most one transport error)
//! - **Trait seam**: [`client::AgentExecutor`], the boundary the server
//!   stubs in tests
//! - **Multiplexer**: [`multiplex::multiplex`], merging the two feeds and a
//!   cancellation token into one ordered
//!   [`relay_core::events::StreamEvent`] sequence

#![deny(unsafe_code)]

pub mod client;
pub mod dto;
pub mod errors;
pub mod multiplex;

pub use client::{AgentExecutor, CallFeeds, ExecutorClient};
pub use errors::ExecutorError;
pub use multiplex::{EventStream, multiplex};
