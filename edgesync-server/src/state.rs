use std::sync::Arc;

use edgesync_core::content::{ContentStore, DuplicateContent, DuplicateName, UploadHooks};
use edgesync_core::manifest::ManifestCache;
use edgesync_core::paths::PathResolver;
use edgesync_core::project::Projects;
use edgesync_core::sync::SyncEngine;
use edgesync_core::traits::{FileStore, HostResolver, ReplicaClient, Repository};
use edgesync_core::warmup::{VersionedFiles, WarmupEngine};

use crate::config::Config;
use crate::error::ServerError;

/// Shared application state passed to all handlers via Axum's State extractor.
pub struct AppState {
    pub projects: Arc<Projects>,
    pub content: ContentStore,
    pub upload_hooks: UploadHooks,
    pub versioned: VersionedFiles,
    pub sync: SyncEngine,
    pub auth_disabled: bool,
}

/// External collaborators the engines are built on.
pub struct Backends {
    pub repository: Arc<dyn Repository>,
    pub fs: Arc<dyn FileStore>,
    pub replicas: Arc<dyn ReplicaClient>,
    pub resolver: Arc<dyn HostResolver>,
}

impl AppState {
    pub fn build(config: &Config, projects: Projects, backends: Backends) -> Result<Self, ServerError> {
        let projects = Arc::new(projects);
        let paths = PathResolver::new(config.roots.clone());

        let cache = ManifestCache::new(backends.fs.clone(), paths.clone());
        let engine = WarmupEngine::new(
            backends.repository.clone(),
            backends.fs.clone(),
            paths.clone(),
            projects.clone(),
            config.warmup_concurrency,
        );
        let versioned = VersionedFiles::new(
            backends.repository.clone(),
            cache,
            engine,
            paths.clone(),
            projects.clone(),
        );
        let sync = SyncEngine::new(
            backends.repository,
            backends.fs.clone(),
            paths.clone(),
            projects.clone(),
            backends.replicas,
            backends.resolver,
            config.static_servers.clone(),
        );

        Ok(Self {
            projects,
            content: ContentStore::new(backends.fs, paths),
            upload_hooks: upload_hooks(&config.upload_hooks)?,
            versioned,
            sync,
            auth_disabled: config.auth_disabled,
        })
    }
}

/// Resolve hook names from the configuration.
pub fn upload_hooks(names: &[String]) -> Result<UploadHooks, ServerError> {
    let mut hooks = UploadHooks::none();
    for name in names {
        hooks = match name.as_str() {
            "duplicate-content" => hooks.with_pre(Arc::new(DuplicateContent)),
            "duplicate-name" => hooks.with_post(Arc::new(DuplicateName)),
            other => return Err(ServerError::Internal(format!("unknown upload hook: {other}"))),
        };
    }
    Ok(hooks)
}
