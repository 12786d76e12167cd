use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::error::{EdgeSyncError, Result, SyncStep};
use crate::manifest::RevisionManifest;
use crate::paths::{cdn_path, fetch_url, purge_url, PathResolver};
use crate::project::{Project, Projects};
use crate::sync::lock::FileLocks;
use crate::sync::policy::FailurePolicy;
use crate::traits::{ByteStream, FileInfo, FileSink, FileStore, HostResolver, ReplicaClient, Repository};

/// A file that could not be synchronized.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncFailure {
    pub filename: String,
    pub error: String,
}

/// Outcome of an update-from-git run.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SyncReport {
    pub synced: Vec<String>,
    pub failed: Vec<SyncFailure>,
    /// Fragments of every synced file, merged.
    pub manifest: RevisionManifest,
}

/// Applies new file contents to the static store and pushes them through
/// every reachable replica, restoring the previous contents on failure.
#[derive(Clone)]
pub struct SyncEngine {
    repository: Arc<dyn Repository>,
    fs: Arc<dyn FileStore>,
    paths: PathResolver,
    projects: Arc<Projects>,
    replicas: Arc<dyn ReplicaClient>,
    resolver: Arc<dyn HostResolver>,
    static_servers: Arc<Vec<String>>,
    locks: FileLocks,
}

impl SyncEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn Repository>,
        fs: Arc<dyn FileStore>,
        paths: PathResolver,
        projects: Arc<Projects>,
        replicas: Arc<dyn ReplicaClient>,
        resolver: Arc<dyn HostResolver>,
        static_servers: Vec<String>,
    ) -> Self {
        Self {
            repository,
            fs,
            paths,
            projects,
            replicas,
            resolver,
            static_servers: Arc::new(static_servers),
            locks: FileLocks::new(),
        }
    }

    /// Replace `filename` of `project` with `content` on this node and on
    /// every reachable replica.
    ///
    /// On error the static file is back to what it was before the call and
    /// the error names the failing [`SyncStep`]. Replicas after the failing
    /// one are not contacted.
    pub async fn update(&self, project_name: &str, filename: &str, content: Vec<u8>) -> Result<RevisionManifest> {
        self.projects.get(project_name)?;
        let static_path = self.paths.static_file_path(project_name, filename)?;
        let backup_path = self.paths.backup_file_path(project_name, filename)?;

        let _guard = self.locks.lock(project_name, filename).await;

        let backed_up = self
            .backup(&static_path, &backup_path)
            .await
            .map_err(|e| at_step(SyncStep::Backup, e))?;

        let hash = self.repository.compute_hash(&content);
        if let Err(e) = self.write_static(&static_path, &content).await {
            self.revert(&static_path, &backup_path, backed_up).await;
            return Err(at_step(SyncStep::Write, e));
        }
        debug!(project = project_name, filename, hash = %hash, "static file written");

        let path = cdn_path(project_name, filename);
        for host in self.reachable_replicas().await {
            if let Err(e) = self.sync_replica(&host, &path, &hash).await {
                warn!(project = project_name, filename, host = %host, error = %e, "replica sync failed, reverting");
                self.revert(&static_path, &backup_path, backed_up).await;
                return Err(e);
            }
            debug!(project = project_name, filename, host = %host, "replica synchronized");
        }

        if backed_up {
            if let Err(e) = self.fs.remove(&backup_path).await {
                warn!(path = %backup_path.display(), error = %e, "can't delete backup");
            }
        }

        info!(project = project_name, filename, hash = %hash, "file updated");
        Ok(RevisionManifest::upload_fragment(filename, hash))
    }

    /// Run [`update`](Self::update) for every file of `manifest`, streaming
    /// contents from the repository one revision group at a time.
    pub async fn update_from_git(
        &self,
        project_name: &str,
        manifest: &RevisionManifest,
        policy: FailurePolicy,
    ) -> Result<SyncReport> {
        let project = self.projects.get(project_name)?;
        let repo_path = self.paths.repo_dir(project_name)?;
        let groups = manifest.group_by_commits();

        info!(project = project_name, revisions = groups.len(), files = manifest.len(), ?policy, "updating from repository");

        let sink = UpdateSink {
            engine: self,
            project_name,
            project,
            policy,
            report: Mutex::new(SyncReport::default()),
        };

        for (revision, filenames) in groups {
            let loaded = self
                .repository
                .load_commit_files(&repo_path, &project.repository, &revision, &filenames, &sink)
                .await;

            if let Err(e) = loaded {
                warn!(project = project_name, revision = %revision, error = %e, "revision group failed");
                if policy.is_fail_fast() {
                    return Err(e);
                }
                sink.fail_unvisited(&filenames, &e);
            }
        }

        let report = sink.into_report();
        info!(project = project_name, synced = report.synced.len(), failed = report.failed.len(), "update from repository finished");
        Ok(report)
    }

    /// Write `content` to the static store only. No backup and no replicas.
    pub async fn upload(&self, project_name: &str, filename: &str, content: &[u8]) -> Result<RevisionManifest> {
        self.projects.get(project_name)?;
        let static_path = self.paths.static_file_path(project_name, filename)?;

        let _guard = self.locks.lock(project_name, filename).await;
        self.write_static(&static_path, content).await?;

        let hash = self.repository.compute_hash(content);
        info!(project = project_name, filename, hash = %hash, "file uploaded");
        Ok(RevisionManifest::upload_fragment(filename, hash))
    }

    /// Every file of the project's static store. A project with no files yet
    /// lists as empty.
    pub async fn list(&self, project_name: &str) -> Result<Vec<FileInfo>> {
        self.projects.get(project_name)?;
        let dir = self.paths.project_static_dir(project_name)?;
        if !self.fs.exists(&dir).await? {
            return Ok(Vec::new());
        }
        self.fs.list_files(&dir).await
    }

    /// Delete a static file, or a whole subtree when `recursive` is set.
    ///
    /// A subtree delete also holds the lock of every file under it, so it
    /// waits for in-flight updates of those files.
    pub async fn remove(&self, project_name: &str, filename: &str, recursive: bool) -> Result<()> {
        self.projects.get(project_name)?;
        let path = self.paths.static_file_path(project_name, filename)?;

        let _guard = self.locks.lock(project_name, filename).await;
        if !self.fs.exists(&path).await? {
            return Err(EdgeSyncError::NotFound(format!("{project_name}/{filename}")));
        }
        if recursive {
            // A plain file has no children to list.
            let mut children: Vec<String> = match self.fs.list_files(&path).await {
                Ok(files) => files.into_iter().map(|f| f.name).collect(),
                Err(_) => Vec::new(),
            };
            children.sort();
            let mut child_guards = Vec::with_capacity(children.len());
            for child in &children {
                let key = format!("{}/{child}", filename.trim_end_matches('/'));
                child_guards.push(self.locks.lock(project_name, &key).await);
            }
            self.fs.remove_all(&path).await?;
        } else {
            self.fs.remove(&path).await?;
        }
        info!(project = project_name, filename, recursive, "static file removed");
        Ok(())
    }

    /// Configured replicas that resolve right now, in configuration order.
    async fn reachable_replicas(&self) -> Vec<String> {
        let mut hosts = Vec::with_capacity(self.static_servers.len());
        for host in self.static_servers.iter() {
            if self.resolver.is_reachable(host).await {
                hosts.push(host.clone());
            } else {
                debug!(host = %host, "replica unreachable, skipping");
            }
        }
        hosts
    }

    async fn sync_replica(&self, host: &str, path: &str, expected: &str) -> Result<()> {
        self.replicas
            .purge(&purge_url(host, path))
            .await
            .map_err(|e| at_step(SyncStep::Purge, e))?;

        let fetched = self
            .replicas
            .fetch(&fetch_url(host, path))
            .await
            .map_err(|e| at_step(SyncStep::Fetch, e))?;

        let actual = self.repository.compute_hash(&fetched);
        if actual != expected {
            return Err(EdgeSyncError::dependency(
                SyncStep::Verify,
                format!("{host}{path}: expected hash {expected}, got {actual}"),
            ));
        }
        Ok(())
    }

    /// Copy the current static file aside. Returns whether there was one.
    async fn backup(&self, static_path: &Path, backup_path: &Path) -> Result<bool> {
        if !self.fs.exists(static_path).await? {
            return Ok(false);
        }
        if let Some(parent) = backup_path.parent() {
            self.fs.mkdir_all(parent).await?;
        }
        self.fs.copy_file(static_path, backup_path).await?;
        Ok(true)
    }

    async fn write_static(&self, static_path: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = static_path.parent() {
            self.fs.mkdir_all(parent).await?;
        }
        self.fs.write_file(static_path, content).await
    }

    /// Put the static file back the way `backup` found it. Log-only.
    async fn revert(&self, static_path: &Path, backup_path: &Path, backed_up: bool) {
        if !backed_up {
            if let Err(e) = self.fs.remove(static_path).await {
                warn!(path = %static_path.display(), error = %e, "can't remove new file");
            }
            return;
        }

        match self.fs.copy_file(backup_path, static_path).await {
            Ok(()) => {
                if let Err(e) = self.fs.remove(backup_path).await {
                    warn!(path = %backup_path.display(), error = %e, "can't delete backup");
                }
            }
            Err(e) => warn!(path = %static_path.display(), error = %e, "can't restore from backup"),
        }
    }
}

/// Re-tag a failure with the step it happened in.
fn at_step(step: SyncStep, error: EdgeSyncError) -> EdgeSyncError {
    match error {
        EdgeSyncError::Dependency { step: s, .. } if s == step => error,
        EdgeSyncError::Dependency { message, .. } => EdgeSyncError::dependency(step, message),
        other => EdgeSyncError::dependency(step, other.to_string()),
    }
}

/// Buffers each streamed file and runs it through [`SyncEngine::update`].
struct UpdateSink<'a> {
    engine: &'a SyncEngine,
    project_name: &'a str,
    project: &'a Project,
    policy: FailurePolicy,
    report: Mutex<SyncReport>,
}

impl UpdateSink<'_> {
    fn record(&self, filename: &str, outcome: &Result<RevisionManifest>) {
        let Ok(mut report) = self.report.lock() else {
            return;
        };
        match outcome {
            Ok(fragment) => {
                report.synced.push(filename.to_string());
                let merged = std::mem::take(&mut report.manifest).assign(fragment.clone());
                report.manifest = merged;
            }
            Err(e) => report.failed.push(SyncFailure {
                filename: filename.to_string(),
                error: e.to_string(),
            }),
        }
    }

    /// Mark every file of a failed group that the sink never saw.
    fn fail_unvisited(&self, filenames: &[String], error: &EdgeSyncError) {
        let Ok(mut report) = self.report.lock() else {
            return;
        };
        for name in filenames {
            let seen = report.synced.contains(name) || report.failed.iter().any(|f| &f.filename == name);
            if !seen {
                report.failed.push(SyncFailure {
                    filename: name.clone(),
                    error: error.to_string(),
                });
            }
        }
    }

    fn into_report(self) -> SyncReport {
        self.report.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<'a> FileSink for UpdateSink<'a> {
    async fn accept(&self, filename: &str, reader: ByteStream<'_>) -> Result<()> {
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .await
            .map_err(|e| EdgeSyncError::dependency(SyncStep::Repository, format!("{filename}: {e}")))?;

        let outcome = match self.project.relative_to_static(filename) {
            Some(relative) => self.engine.update(self.project_name, relative, content).await,
            None => Err(EdgeSyncError::Client(format!(
                "{filename} is outside the project's static path"
            ))),
        };
        self.record(filename, &outcome);

        match outcome {
            Err(e) if self.policy.is_fail_fast() => Err(e),
            _ => Ok(()),
        }
    }
}
