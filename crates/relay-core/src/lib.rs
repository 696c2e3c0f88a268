//! # relay-core
//!
//! Foundation types for the relay chat orchestrator.
//!
//! This crate provides the shared vocabulary the other relay crates depend on:
//!
//! - **Requests / responses**: [`request::ChatRequest`], [`response::ChatResponse`]
//! - **Stream events**: [`events::StreamEvent`], the single ordered event
//!   union every downstream call is collapsed into
//! - **Upstream errors**: [`upstream::UpstreamError`] and in-band classification
//! - **Errors**: [`errors::ChatError`] taxonomy via `thiserror`
//! - **IDs**: [`ids::generate`] time-ordered identifiers
//! - **Sessions**: [`session::ConversationSession`] with TTL expiry
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other relay crates. No I/O.

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod request;
pub mod response;
pub mod session;
pub mod upstream;
