//! Liveness and readiness probes.
//!
//! Both answer 200 unconditionally. The chat subsystem degrading (executor
//! unreachable, storage trouble) is reported per-request; it never takes the
//! process out of rotation.

/// `GET /ready`
pub async fn ready() -> &'static str {
    "ok"
}

/// `GET /alive`
pub async fn alive() -> &'static str {
    "ok"
}
