use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;
use crate::manifest::{ManifestCache, RevisionManifest};
use crate::paths::PathResolver;
use crate::project::Projects;
use crate::sync::policy::FailurePolicy;
use crate::traits::Repository;
use crate::warmup::engine::{WarmupEngine, WarmupReport};

/// Entry points behind the versioned-file routes.
#[derive(Clone)]
pub struct VersionedFiles {
    repository: Arc<dyn Repository>,
    cache: ManifestCache,
    engine: WarmupEngine,
    paths: PathResolver,
    projects: Arc<Projects>,
}

impl VersionedFiles {
    pub fn new(
        repository: Arc<dyn Repository>,
        cache: ManifestCache,
        engine: WarmupEngine,
        paths: PathResolver,
        projects: Arc<Projects>,
    ) -> Self {
        Self {
            repository,
            cache,
            engine,
            paths,
            projects,
        }
    }

    /// Manifest of `project` at `tag`.
    ///
    /// The tag is resolved to a commit first; a cached record for that commit
    /// is returned as is. Otherwise the manifest is built from the repository,
    /// warmed into the versioned cache and recorded for the next request.
    pub async fn get_manifest(&self, project_name: &str, tag: &str) -> Result<RevisionManifest> {
        let project = self.projects.get(project_name)?;
        let repo_path = self.paths.repo_dir(project_name)?;

        self.repository
            .clone_or_fetch(&repo_path, &project.repository, tag)
            .await?;
        let revision = self.repository.resolve_revision(&repo_path, tag).await?;

        if self.cache.cached_revisions(project_name).await.contains(&revision) {
            if let Some(manifest) = self.cache.lookup(project_name, &revision).await {
                info!(project = project_name, tag, revision = %revision, "serving cached manifest");
                return Ok(manifest);
            }
        }

        let manifest = self
            .repository
            .create_manifest_for_files(&repo_path, &revision, &|name: &str| project.accepts(name))
            .await?;
        info!(project = project_name, tag, revision = %revision, files = manifest.len(), "manifest built");

        let report = self
            .engine
            .warmup(project_name, &manifest, FailurePolicy::BestEffort)
            .await?;
        if !report.failed.is_empty() {
            warn!(project = project_name, revision = %revision, failed = report.failed.len(), "manifest partially warmed");
        }

        self.cache.store(project_name, &revision, &manifest).await;
        Ok(manifest)
    }

    /// Warm an externally supplied manifest. With `base_revision`, files the
    /// manifest lacks are filled in from that revision's cached record.
    pub async fn warm_up(
        &self,
        project_name: &str,
        manifest: RevisionManifest,
        base_revision: Option<&str>,
        policy: FailurePolicy,
    ) -> Result<WarmupReport> {
        self.projects.get(project_name)?;
        let manifest = match base_revision {
            Some(base) => self.cache.merge_with_cached(manifest, project_name, base).await,
            None => manifest,
        };
        self.engine.warmup(project_name, &manifest, policy).await
    }

    pub async fn get_uncached_file(&self, project_name: &str, request_path: &str) -> Result<Vec<u8>> {
        self.engine.get_uncached_file(project_name, request_path).await
    }
}
