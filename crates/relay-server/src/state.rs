//! Shared application state.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use relay_executor::AgentExecutor;
use relay_store::Pool;

use crate::session::SessionInitializer;
use crate::settings::RelaySettings;
use crate::shutdown::ShutdownCoordinator;

/// Everything a handler needs, built once at startup and cloned per request.
/// No ambient globals; tests assemble the same struct with stubs.
#[derive(Clone)]
pub struct AppState {
    /// Downstream executor boundary.
    pub executor: Arc<dyn AgentExecutor>,
    /// SQLite connection pool.
    pub pool: Pool,
    /// Session registry.
    pub sessions: Arc<SessionInitializer>,
    /// Runtime configuration.
    pub settings: Arc<RelaySettings>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Assembles state from its parts.
    #[must_use]
    pub fn new(
        executor: Arc<dyn AgentExecutor>,
        pool: Pool,
        settings: RelaySettings,
        metrics: PrometheusHandle,
    ) -> Self {
        let sessions = Arc::new(SessionInitializer::new(settings.session_ttl_secs));
        Self {
            executor,
            pool,
            sessions,
            settings: Arc::new(settings),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
        }
    }
}
