//! # relay-store
//!
//! SQLite persistence for the relay chat orchestrator:
//!
//! - **Pooling**: [`connection::new_pool`] / [`connection::new_in_memory`]
//!   over r2d2 + rusqlite (bundled)
//! - **Migrations**: [`migrations::run_migrations`], idempotent DDL
//! - **ID allocation**: [`allocator::IdAllocator`], bounded-retry unique ids
//! - **Repositories**: [`conversations::ConversationRepo`] and
//!   [`messages::MessageRepo`], stateless over `&Connection`
//!
//! Repositories do not open their own connections; callers check one out of
//! the pool and pass it down, so a single request can run several operations
//! on one connection.

#![deny(unsafe_code)]

pub mod allocator;
pub mod connection;
pub mod conversations;
pub mod errors;
pub mod messages;
pub mod migrations;

pub use allocator::{ExistenceProbe, IdAllocator, MAX_ATTEMPTS};
pub use connection::{ConnectionConfig, Pool, new_in_memory, new_pool};
pub use errors::StoreError;
