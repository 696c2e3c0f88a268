//! relay: streaming chat orchestration service.
//!
//! Wires settings, storage, the executor client, and the HTTP surface
//! together, then serves until SIGINT/SIGTERM. In-flight chat streams get a
//! grace period to finish; if they do not, the process exits non-zero.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use relay_server::settings::RelaySettings;
use relay_server::shutdown::ShutdownOutcome;
use relay_server::{AppState, metrics, routes};
use relay_store::{ConnectionConfig, new_pool};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "relay", about = "Streaming chat orchestration service")]
struct Cli {
    /// Path to a JSON settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the agent executor base URL.
    #[arg(long)]
    executor_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings =
        RelaySettings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(bind) = cli.bind {
        settings.bind_addr = bind;
    }
    if let Some(url) = cli.executor_url {
        settings.executor_url = url;
    }

    let metrics_handle = metrics::install_recorder().context("installing metrics recorder")?;

    let pool = new_pool(&ConnectionConfig {
        path: settings.database_path.clone(),
        max_connections: 8,
    })
    .context("opening database")?;
    {
        let conn = pool.get().context("checking out migration connection")?;
        relay_store::migrations::run_migrations(&conn).context("running migrations")?;
    }

    let executor = relay_executor::ExecutorClient::new(settings.executor_url.clone())
        .context("building executor client")?;

    let grace = settings.shutdown_grace();
    let state = AppState::new(Arc::new(executor), pool, settings, metrics_handle);
    let shutdown = Arc::clone(&state.shutdown);

    let listener = tokio::net::TcpListener::bind(&state.settings.bind_addr)
        .await
        .with_context(|| format!("binding {}", state.settings.bind_addr))?;
    info!(addr = %state.settings.bind_addr, "listening");

    let app = routes::router(state);
    let draining = shutdown.draining_token();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { draining.cancelled().await })
            .await
    });

    wait_for_signal().await;
    info!("signal received, draining");

    let outcome = shutdown.drain(grace).await;
    match outcome {
        ShutdownOutcome::Clean => {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!(%err, "server error during shutdown"),
                Err(err) => error!(%err, "server task failed"),
            }
            info!("shutdown complete");
            Ok(())
        }
        ShutdownOutcome::Forced => {
            server.abort();
            error!("shutdown forced after grace period");
            std::process::exit(1);
        }
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(err) => {
                error!(%err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
