//! # relay-server
//!
//! The HTTP surface and orchestration layer of the relay chat service:
//!
//! - **Routes**: [`routes::router`] with `POST /api/v1/chat` (JSON or SSE),
//!   `/ready`, `/alive`, `/metrics`
//! - **Chat service**: [`chat`] for session init, message persistence,
//!   downstream calls, and stream driving
//! - **Sessions**: [`session::SessionInitializer`], at-most-once downstream
//!   session init per conversation
//! - **Shutdown**: [`shutdown::ShutdownCoordinator`], Serving to Draining to
//!   Stopped with a bounded grace period
//! - **Settings**: [`settings::RelaySettings`] with defaults, optional JSON
//!   file, `RELAY_*` env overrides

#![deny(unsafe_code)]

pub mod chat;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod session;
pub mod settings;
pub mod shutdown;
pub mod sse;
pub mod state;

pub use errors::ServerError;
pub use state::AppState;
