use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EdgeSyncError;
use crate::traits::FileStore;

/// Transforms the buffered upload before anything is written.
#[async_trait]
pub trait PreWriteHook: Send + Sync {
    async fn before_write(&self, data: &mut Vec<u8>) -> Result<(), EdgeSyncError>;
}

/// Runs against the stored file once it is on disk.
#[async_trait]
pub trait PostWriteHook: Send + Sync {
    async fn after_write(&self, fs: &dyn FileStore, stored: &Path) -> Result<(), EdgeSyncError>;
}

/// Optional hooks applied around [`ContentStore::save`](super::ContentStore::save).
#[derive(Clone, Default)]
pub struct UploadHooks {
    pub pre: Option<Arc<dyn PreWriteHook>>,
    pub post: Option<Arc<dyn PostWriteHook>>,
}

impl UploadHooks {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_pre(mut self, hook: Arc<dyn PreWriteHook>) -> Self {
        self.pre = Some(hook);
        self
    }

    pub fn with_post(mut self, hook: Arc<dyn PostWriteHook>) -> Self {
        self.post = Some(hook);
        self
    }
}

/// Appends the upload to itself.
pub struct DuplicateContent;

#[async_trait]
impl PreWriteHook for DuplicateContent {
    async fn before_write(&self, data: &mut Vec<u8>) -> Result<(), EdgeSyncError> {
        data.extend_from_within(..);
        Ok(())
    }
}

/// Renames `dir/name` to `dir/namename`.
pub struct DuplicateName;

#[async_trait]
impl PostWriteHook for DuplicateName {
    async fn after_write(&self, fs: &dyn FileStore, stored: &Path) -> Result<(), EdgeSyncError> {
        let name = stored
            .file_name()
            .ok_or_else(|| EdgeSyncError::Client(format!("no file name in {}", stored.display())))?;
        let mut doubled = name.to_os_string();
        doubled.push(name);
        fs.rename(stored, &stored.with_file_name(doubled)).await
    }
}
