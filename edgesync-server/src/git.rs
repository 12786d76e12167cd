//! [`Repository`] backed by the `git` command line.

use std::path::Path;

use async_trait::async_trait;
use edgesync_core::error::{EdgeSyncError, SyncStep};
use edgesync_core::manifest::{FileVersion, RevisionManifest};
use edgesync_core::traits::{FileSink, Repository};
use tokio::process::Command;

pub struct GitCli {
    binary: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            binary: "git".to_string(),
        }
    }

    async fn run(&self, repo_path: Option<&Path>, args: &[&str]) -> Result<Vec<u8>, EdgeSyncError> {
        let mut cmd = Command::new(&self.binary);
        if let Some(dir) = repo_path {
            cmd.arg("-C").arg(dir);
        }
        cmd.args(args);

        let output = cmd
            .output()
            .await
            .map_err(|e| repo_err(format!("can't run {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(args = ?args, stderr = %stderr.trim(), "git command failed");
            return Err(repo_err(format!("git {} failed: {}", args.join(" "), stderr.trim())));
        }
        Ok(output.stdout)
    }

    async fn run_text(&self, repo_path: &Path, args: &[&str]) -> Result<String, EdgeSyncError> {
        let out = self.run(Some(repo_path), args).await?;
        String::from_utf8(out).map_err(|e| repo_err(format!("git {} printed non-UTF-8: {e}", args.join(" "))))
    }

    async fn is_cloned(repo_path: &Path) -> bool {
        tokio::fs::try_exists(repo_path.join("HEAD")).await.unwrap_or(false)
            || tokio::fs::try_exists(repo_path.join(".git")).await.unwrap_or(false)
    }

    async fn ensure_cloned(&self, repo_path: &Path, repo_url: &str) -> Result<(), EdgeSyncError> {
        if Self::is_cloned(repo_path).await {
            return Ok(());
        }
        if let Some(parent) = repo_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| repo_err(format!("can't create {}: {e}", parent.display())))?;
        }
        let target = repo_path.to_string_lossy();
        self.run(None, &["clone", "--bare", "--quiet", repo_url, &target]).await?;
        tracing::info!(url = %repo_url, path = %repo_path.display(), "repository cloned");
        Ok(())
    }

    /// Last commit at or before `revision` that touched `filename`.
    async fn last_commit(&self, repo_path: &Path, revision: &str, filename: &str) -> Result<String, EdgeSyncError> {
        let out = self
            .run_text(repo_path, &["rev-list", "-1", revision, "--", filename])
            .await?;
        let commit = out.trim();
        if commit.is_empty() {
            return Err(repo_err(format!("no commit touches {filename} at {revision}")));
        }
        Ok(commit.to_string())
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for GitCli {
    async fn clone_or_fetch(&self, repo_path: &Path, repo_url: &str, reference: &str) -> Result<(), EdgeSyncError> {
        if !Self::is_cloned(repo_path).await {
            return self.ensure_cloned(repo_path, repo_url).await;
        }
        self.run(
            Some(repo_path),
            &["fetch", "--quiet", "--tags", "--force", repo_url, "+refs/heads/*:refs/heads/*"],
        )
        .await?;
        tracing::debug!(path = %repo_path.display(), reference, "repository fetched");
        Ok(())
    }

    async fn resolve_revision(&self, repo_path: &Path, reference: &str) -> Result<String, EdgeSyncError> {
        let commitish = format!("{reference}^{{commit}}");
        let out = self.run_text(repo_path, &["rev-parse", "--verify", "--quiet", &commitish]).await?;
        Ok(out.trim().to_string())
    }

    async fn create_manifest_for_files(
        &self,
        repo_path: &Path,
        revision: &str,
        filter: &(dyn for<'a> Fn(&'a str) -> bool + Send + Sync),
    ) -> Result<RevisionManifest, EdgeSyncError> {
        let listing = self.run_text(repo_path, &["ls-tree", "-r", "-z", revision]).await?;

        let mut manifest = RevisionManifest::new();
        for entry in listing.split('\0').filter(|e| !e.is_empty()) {
            // <mode> SP <type> SP <object> TAB <path>
            let Some((meta, filename)) = entry.split_once('\t') else {
                continue;
            };
            let mut fields = meta.split(' ');
            let (Some(_mode), Some(kind), Some(object)) = (fields.next(), fields.next(), fields.next()) else {
                continue;
            };
            if kind != "blob" || !filter(filename) {
                continue;
            }
            let commit = self.last_commit(repo_path, revision, filename).await?;
            manifest.insert(filename, FileVersion::new(commit, object));
        }

        tracing::debug!(path = %repo_path.display(), revision, files = manifest.len(), "manifest listed");
        Ok(manifest)
    }

    async fn load_commit_files(
        &self,
        repo_path: &Path,
        repo_url: &str,
        revision: &str,
        filenames: &[String],
        sink: &dyn FileSink,
    ) -> Result<(), EdgeSyncError> {
        self.ensure_cloned(repo_path, repo_url).await?;
        for filename in filenames {
            let object = format!("{revision}:{filename}");
            let data = self.run(Some(repo_path), &["cat-file", "blob", &object]).await?;
            let mut reader: &[u8] = &data;
            sink.accept(filename, &mut reader).await?;
        }
        Ok(())
    }
}

fn repo_err(message: String) -> EdgeSyncError {
    EdgeSyncError::dependency(SyncStep::Repository, message)
}
