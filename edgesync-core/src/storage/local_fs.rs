use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::EdgeSyncError;
use crate::traits::repository::ByteStream;
use crate::traits::storage::{FileInfo, FileStore};

const KIND_FILE: &str = "file";

/// [`FileStore`] over the local filesystem via `tokio::fs`.
#[derive(Debug, Clone, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

fn storage_err(action: &str, path: &Path, e: std::io::Error) -> EdgeSyncError {
    if e.kind() == std::io::ErrorKind::NotFound {
        EdgeSyncError::NotFound(format!("{}", path.display()))
    } else {
        EdgeSyncError::Storage(format!("{action} {} failed: {e}", path.display()))
    }
}

#[async_trait]
impl FileStore for LocalFs {
    async fn mkdir_all(&self, path: &Path) -> Result<(), EdgeSyncError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| storage_err("create dir", path, e))
    }

    async fn exists(&self, path: &Path) -> Result<bool, EdgeSyncError> {
        fs::try_exists(path)
            .await
            .map_err(|e| storage_err("stat", path, e))
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> Result<(), EdgeSyncError> {
        fs::copy(from, to)
            .await
            .map_err(|e| storage_err("copy", from, e))?;
        debug!(from = %from.display(), to = %to.display(), "copied file");
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), EdgeSyncError> {
        fs::write(path, data)
            .await
            .map_err(|e| storage_err("write", path, e))?;
        debug!(path = %path.display(), size = data.len(), "wrote file");
        Ok(())
    }

    async fn write_stream(&self, path: &Path, reader: ByteStream<'_>) -> Result<u64, EdgeSyncError> {
        let mut file = fs::File::create(path)
            .await
            .map_err(|e| storage_err("create", path, e))?;
        let written = tokio::io::copy(reader, &mut file)
            .await
            .map_err(|e| storage_err("stream into", path, e))?;
        file.flush().await.map_err(|e| storage_err("flush", path, e))?;
        debug!(path = %path.display(), size = written, "streamed file");
        Ok(written)
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, EdgeSyncError> {
        fs::read(path).await.map_err(|e| storage_err("read", path, e))
    }

    async fn remove(&self, path: &Path) -> Result<(), EdgeSyncError> {
        fs::remove_file(path)
            .await
            .map_err(|e| storage_err("remove", path, e))
    }

    async fn remove_all(&self, path: &Path) -> Result<(), EdgeSyncError> {
        let meta = fs::metadata(path)
            .await
            .map_err(|e| storage_err("stat", path, e))?;
        let result = if meta.is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        result.map_err(|e| storage_err("remove", path, e))
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<String>, EdgeSyncError> {
        let mut entries = fs::read_dir(path)
            .await
            .map_err(|e| storage_err("read dir", path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_err("read dir entry", path, e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn list_files(&self, path: &Path) -> Result<Vec<FileInfo>, EdgeSyncError> {
        let mut files = Vec::new();
        let mut pending: Vec<PathBuf> = vec![path.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| storage_err("read dir", &dir, e))?;

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| storage_err("read dir entry", &dir, e))?
            {
                let entry_path = entry.path();
                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| storage_err("stat", &entry_path, e))?;

                if meta.is_dir() {
                    pending.push(entry_path);
                    continue;
                }

                let name = entry_path
                    .strip_prefix(path)
                    .unwrap_or(&entry_path)
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                files.push(FileInfo {
                    name,
                    size: meta.len(),
                    kind: KIND_FILE,
                    modified_at: meta.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(path = %path.display(), count = files.len(), "listed files");
        Ok(files)
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<(), EdgeSyncError> {
        fs::rename(from, to)
            .await
            .map_err(|e| storage_err("rename", from, e))
    }
}
