use async_trait::async_trait;

use crate::error::EdgeSyncError;

/// HTTP access to a CDN/static replica.
#[async_trait]
pub trait ReplicaClient: Send + Sync {
    /// Evict the object behind `url` from the replica cache.
    async fn purge(&self, url: &str) -> Result<(), EdgeSyncError>;
    /// Fetch the object behind `url`, pulling it from origin if needed.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, EdgeSyncError>;
}

/// Reachability probe for replica hosts. Answers are never cached.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn is_reachable(&self, host: &str) -> bool;
}
