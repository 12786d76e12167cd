use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{EdgeSyncError, SyncStep};
use crate::hash;
use crate::manifest::RevisionManifest;

/// Borrowed byte stream handed to sinks and hashers.
pub type ByteStream<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

/// Caller-supplied receiver for files streamed out of a repository.
#[async_trait]
pub trait FileSink: Send + Sync {
    async fn accept(&self, filename: &str, reader: ByteStream<'_>) -> Result<(), EdgeSyncError>;
}

/// Source-of-truth repository holding every revision of a project's files.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Make `repo_path` a local copy of `repo_url` that knows `reference`.
    async fn clone_or_fetch(
        &self,
        repo_path: &Path,
        repo_url: &str,
        reference: &str,
    ) -> Result<(), EdgeSyncError>;

    /// Resolve a tag, branch or short hash to a full commit hash.
    async fn resolve_revision(&self, repo_path: &Path, reference: &str) -> Result<String, EdgeSyncError>;

    /// Build a manifest of every file at `revision` accepted by `filter`,
    /// each entry pointing at the last commit that touched it.
    async fn create_manifest_for_files(
        &self,
        repo_path: &Path,
        revision: &str,
        filter: &(dyn for<'a> Fn(&'a str) -> bool + Send + Sync),
    ) -> Result<RevisionManifest, EdgeSyncError>;

    /// Stream each of `filenames` as of `revision` into `sink`. The first
    /// sink error stops the stream and is returned unchanged.
    async fn load_commit_files(
        &self,
        repo_path: &Path,
        repo_url: &str,
        revision: &str,
        filenames: &[String],
        sink: &dyn FileSink,
    ) -> Result<(), EdgeSyncError>;

    fn compute_hash(&self, data: &[u8]) -> String {
        hash::git_blob_hash(data)
    }

    async fn compute_stream_hash(&self, reader: ByteStream<'_>) -> Result<String, EdgeSyncError> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| EdgeSyncError::dependency(SyncStep::Repository, format!("read stream failed: {e}")))?;
        Ok(self.compute_hash(&buf))
    }
}
