//! HTTP replica client and DNS reachability probe.

use std::time::Duration;

use async_trait::async_trait;
use edgesync_core::error::{EdgeSyncError, SyncStep};
use edgesync_core::traits::{HostResolver, ReplicaClient};
use reqwest::{Method, StatusCode};

/// Talks to CDN/static replicas over plain HTTP.
pub struct HttpReplicaClient {
    client: reqwest::Client,
}

impl HttpReplicaClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }
}

#[async_trait]
impl ReplicaClient for HttpReplicaClient {
    /// Sends `PURGE <url>`. A 404 means nothing was cached and counts as done.
    async fn purge(&self, url: &str) -> Result<(), EdgeSyncError> {
        let method = Method::from_bytes(b"PURGE")
            .map_err(|e| EdgeSyncError::dependency(SyncStep::Purge, e.to_string()))?;

        let response = self
            .client
            .request(method, url)
            .send()
            .await
            .map_err(|e| EdgeSyncError::dependency(SyncStep::Purge, format!("{url}: {e}")))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            tracing::debug!(url, %status, "replica purged");
            return Ok(());
        }
        Err(EdgeSyncError::dependency(SyncStep::Purge, format!("{url}: status {status}")))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, EdgeSyncError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EdgeSyncError::dependency(SyncStep::Fetch, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EdgeSyncError::dependency(SyncStep::Fetch, format!("{url}: status {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| EdgeSyncError::dependency(SyncStep::Fetch, format!("{url}: {e}")))?;
        Ok(body.to_vec())
    }
}

/// A host is reachable when its name resolves. Nothing is cached.
pub struct DnsResolver;

#[async_trait]
impl HostResolver for DnsResolver {
    async fn is_reachable(&self, host: &str) -> bool {
        let target = if host.contains(':') {
            host.to_string()
        } else {
            format!("{host}:80")
        };
        match tokio::net::lookup_host(target).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                tracing::debug!(host, error = %e, "replica host does not resolve");
                false
            }
        }
    }
}
