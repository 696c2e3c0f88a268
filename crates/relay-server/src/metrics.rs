//! Metrics recorder and metric name constants.

use axum::extract::State;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

/// Metric names. Kept in one place so dashboards and code cannot drift.
pub mod names {
    /// Chat requests received, labeled by `call_type`.
    pub const CHAT_REQUESTS_TOTAL: &str = "relay_chat_requests_total";
    /// In-band upstream errors detected, labeled by `origin`.
    pub const CHAT_UPSTREAM_ERRORS_TOTAL: &str = "relay_chat_upstream_errors_total";
    /// Chat streams that ended without a terminal frame.
    pub const CHAT_CANCELLED_TOTAL: &str = "relay_chat_cancelled_total";
    /// Wall time of a chat exchange, start to final event.
    pub const CHAT_DURATION_SECONDS: &str = "relay_chat_duration_seconds";
    /// Downstream sessions initialized.
    pub const SESSIONS_INITIALIZED_TOTAL: &str = "relay_sessions_initialized_total";
}

/// Installs the global Prometheus recorder. Call once, from the binary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Builds a handle without installing a global recorder. Tests use this so
/// several router instances can coexist in one process.
#[must_use]
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// `GET /metrics`: Prometheus text exposition.
pub async fn render(State(state): State<AppState>) -> String {
    state.metrics.render()
}
