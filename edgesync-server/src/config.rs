use std::env;
use std::path::PathBuf;
use std::time::Duration;

use edgesync_core::constants::DEFAULT_WARMUP_CONCURRENCY;
use edgesync_core::paths::StorageRoots;
use edgesync_core::project::Projects;

use crate::error::ServerError;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub http_host: String,
    pub http_port: u16,
    pub roots: StorageRoots,
    /// Replica hosts, in the order updates visit them.
    pub static_servers: Vec<String>,
    pub warmup_concurrency: usize,
    pub replica_timeout: Duration,
    /// Skip the `Token` header check on `/api/*`.
    pub auth_disabled: bool,
    /// Hook names applied to digest uploads, see [`crate::state::upload_hooks`].
    pub upload_hooks: Vec<String>,
    pub projects_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// - `HTTP_HOST` (default `0.0.0.0`), `HTTP_PORT` (default 8081)
    /// - `CONTENT_DIR`, `STATIC_DIR`, `CACHE_DIR`, `BACKUP_DIR`, `REPO_DIR` (default under `./data`)
    /// - `STATIC_SERVERS`: comma-separated replica hosts
    /// - `WARMUP_CONCURRENCY` (default 8), `REPLICA_TIMEOUT_SECS` (default 10)
    /// - `AUTH_DISABLED`: `true`/`1` turns token auth off
    /// - `UPLOAD_HOOKS`: comma-separated, `duplicate-content` and/or `duplicate-name`
    /// - `PROJECTS_FILE`: JSON object of project settings
    pub fn from_env() -> Self {
        let http_host = env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let http_port = env::var("HTTP_PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8081);

        let dir = |key: &str, default: &str| PathBuf::from(env::var(key).unwrap_or_else(|_| default.to_string()));
        let roots = StorageRoots {
            content_dir: dir("CONTENT_DIR", "./data/content"),
            static_dir: dir("STATIC_DIR", "./data/static"),
            cache_dir: dir("CACHE_DIR", "./data/cache"),
            backup_dir: dir("BACKUP_DIR", "./data/backup"),
            repo_dir: dir("REPO_DIR", "./data/repos"),
        };

        let warmup_concurrency = env::var("WARMUP_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_WARMUP_CONCURRENCY);

        let replica_timeout = env::var("REPLICA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        let auth_disabled = env::var("AUTH_DISABLED")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            http_host,
            http_port,
            roots,
            static_servers: split_list(&env::var("STATIC_SERVERS").unwrap_or_default()),
            warmup_concurrency,
            replica_timeout,
            auth_disabled,
            upload_hooks: split_list(&env::var("UPLOAD_HOOKS").unwrap_or_default()),
            projects_file: env::var("PROJECTS_FILE").ok().map(PathBuf::from),
        }
    }

    /// Read the projects file. No file configured means no projects.
    pub async fn load_projects(&self) -> Result<Projects, ServerError> {
        let Some(path) = &self.projects_file else {
            return Ok(Projects::default());
        };
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| ServerError::Internal(format!("can't read {}: {e}", path.display())))?;
        parse_projects(&raw)
    }
}

pub fn parse_projects(raw: &[u8]) -> Result<Projects, ServerError> {
    serde_json::from_slice(raw).map_err(|e| ServerError::Internal(format!("bad projects file: {e}")))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
