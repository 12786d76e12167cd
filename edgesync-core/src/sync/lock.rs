use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per `(project, filename)`.
///
/// Entries are created on first use and kept for the life of the table.
#[derive(Clone, Default)]
pub struct FileLocks {
    inner: Arc<DashMap<(String, String), Arc<Mutex<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `filename` within `project`.
    pub async fn lock(&self, project: &str, filename: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .inner
            .entry((project.to_string(), filename.to_string()))
            .or_default()
            .clone();
        mutex.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
