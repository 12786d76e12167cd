use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::EdgeSyncError;
use crate::traits::repository::ByteStream;

/// One entry of a recursive directory listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileInfo {
    /// Path relative to the listed directory, `/`-separated.
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(rename = "mtime", skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

/// Filesystem operations used by the engines. Every call reports failure as
/// an error value; implementations must not panic on missing paths.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn mkdir_all(&self, path: &Path) -> Result<(), EdgeSyncError>;
    async fn exists(&self, path: &Path) -> Result<bool, EdgeSyncError>;
    async fn copy_file(&self, from: &Path, to: &Path) -> Result<(), EdgeSyncError>;
    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), EdgeSyncError>;
    /// Stream `reader` into `path`, returning the number of bytes written.
    async fn write_stream(&self, path: &Path, reader: ByteStream<'_>) -> Result<u64, EdgeSyncError>;
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, EdgeSyncError>;
    async fn remove(&self, path: &Path) -> Result<(), EdgeSyncError>;
    async fn remove_all(&self, path: &Path) -> Result<(), EdgeSyncError>;
    /// Names of the direct children of `path`.
    async fn list_dir(&self, path: &Path) -> Result<Vec<String>, EdgeSyncError>;
    /// Every regular file below `path`.
    async fn list_files(&self, path: &Path) -> Result<Vec<FileInfo>, EdgeSyncError>;
    async fn rename(&self, from: &Path, to: &Path) -> Result<(), EdgeSyncError>;
}
