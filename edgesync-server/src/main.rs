mod api;
mod config;
mod error;
mod git;
mod replica;
mod state;

use std::sync::Arc;

use edgesync_core::storage::LocalFs;
use tracing_subscriber::EnvFilter;

use config::Config;
use git::GitCli;
use replica::{DnsResolver, HttpReplicaClient};
use state::{AppState, Backends};

#[tokio::main]
async fn main() {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("edgesync_server=info,edgesync_core=info,tower_http=info")
            }),
        )
        .init();

    tracing::info!("edgesync server starting...");

    // Load .env file if present (non-fatal if missing).
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("no .env file loaded: {e}");
    }

    let config = Config::from_env();
    tracing::info!(
        host = %config.http_host,
        port = config.http_port,
        static_servers = config.static_servers.len(),
        warmup_concurrency = config.warmup_concurrency,
        auth_disabled = config.auth_disabled,
        "configuration loaded"
    );

    let projects = match config.load_projects().await {
        Ok(projects) => projects,
        Err(e) => {
            tracing::error!(error = %e, "failed to load projects");
            std::process::exit(1);
        }
    };
    if projects.is_empty() {
        tracing::warn!("no projects configured, versioned and /api routes will reject every project");
    }

    for dir in config.roots.all() {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::error!(dir = %dir.display(), error = %e, "failed to create storage directory");
            std::process::exit(1);
        }
    }

    let backends = Backends {
        repository: Arc::new(GitCli::new()),
        fs: Arc::new(LocalFs::new()),
        replicas: Arc::new(HttpReplicaClient::new(config.replica_timeout)),
        resolver: Arc::new(DnsResolver),
    };

    let state = match AppState::build(&config, projects, backends) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!(error = %e, "failed to build application state");
            std::process::exit(1);
        }
    };

    let router = api::build_router(state);

    let addr = format!("{}:{}", config.http_host, config.http_port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind HTTP listener");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "edgesync server listening");

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Axum server error");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "can't listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
