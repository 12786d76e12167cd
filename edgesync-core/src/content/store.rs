use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::content::hooks::UploadHooks;
use crate::error::{EdgeSyncError, Result};
use crate::hash::md5_hex;
use crate::paths::PathResolver;
use crate::traits::FileStore;

/// Blobs stored under `content_dir/<digest[:2]>/<digest>`, where the digest is
/// the MD5 of the stored bytes. Identical uploads land on the same path.
#[derive(Clone)]
pub struct ContentStore {
    fs: Arc<dyn FileStore>,
    paths: PathResolver,
}

impl ContentStore {
    pub fn new(fs: Arc<dyn FileStore>, paths: PathResolver) -> Self {
        Self { fs, paths }
    }

    /// Store `data` and return its digest.
    ///
    /// The pre-write hook runs on the buffered bytes and can abort the save
    /// before anything touches disk. The post-write hook runs on the stored
    /// file; its failure is returned but the file stays in place.
    pub async fn save(&self, mut data: Vec<u8>, hooks: &UploadHooks) -> Result<String> {
        if let Some(pre) = &hooks.pre {
            pre.before_write(&mut data)
                .await
                .map_err(|e| EdgeSyncError::Client(format!("file modification failed: {e}")))?;
        }

        let digest = md5_hex(&data);
        let dir = self.paths.digest_dir(&digest)?;
        let path = self.paths.digest_path(&digest)?;

        debug!(dir = %dir.display(), "creating bucket directory");
        self.fs.mkdir_all(&dir).await?;
        self.fs.write_file(&path, &data).await?;
        info!(digest = %digest, size = data.len(), "content stored");

        if let Some(post) = &hooks.post {
            if let Err(e) = post.after_write(self.fs.as_ref(), &path).await {
                warn!(digest = %digest, error = %e, "post-write hook failed, keeping stored file");
                return Err(EdgeSyncError::Client(format!("file modification failed: {e}")));
            }
        }

        Ok(digest)
    }

    /// Bytes stored under `digest`.
    pub async fn fetch(&self, digest: &str) -> Result<Vec<u8>> {
        let path = self.paths.digest_path(digest)?;
        match self.fs.read_file(&path).await {
            Err(EdgeSyncError::NotFound(_)) => {
                Err(EdgeSyncError::NotFound(format!("file {digest} doesn't exist")))
            }
            other => other,
        }
    }

    /// Remove the blob stored under `digest`. A missing blob is reported as
    /// [`EdgeSyncError::NotFound`], never as a storage failure.
    pub async fn delete(&self, digest: &str) -> Result<()> {
        let path = self.paths.digest_path(digest)?;
        if !self.fs.exists(&path).await? {
            return Err(EdgeSyncError::NotFound(format!(
                "file with that name doesn't exist: {digest}"
            )));
        }
        self.fs.remove(&path).await?;
        info!(digest = %digest, "content removed");
        Ok(())
    }
}
