//! In-memory collaborators shared by the engine tests.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{EdgeSyncError, SyncStep};
use crate::manifest::{FileVersion, RevisionManifest};
use crate::traits::{FileSink, HostResolver, ReplicaClient, Repository};

/// Repository whose revisions are maps of filename to bytes.
#[derive(Default)]
pub struct FakeRepository {
    revisions: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
    refs: Mutex<BTreeMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    revision_delays: Mutex<BTreeMap<String, Duration>>,
    /// Revisions in the order their loads finished.
    pub completed: Mutex<Vec<String>>,
    pub manifest_calls: AtomicUsize,
    pub load_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, revision: &str, filename: &str, content: &[u8]) -> Self {
        self.revisions
            .lock()
            .unwrap()
            .entry(revision.to_string())
            .or_default()
            .insert(filename.to_string(), content.to_vec());
        self
    }

    pub fn with_ref(self, reference: &str, revision: &str) -> Self {
        self.refs
            .lock()
            .unwrap()
            .insert(reference.to_string(), revision.to_string());
        self
    }

    pub fn failing_revision(self, revision: &str) -> Self {
        self.failing.lock().unwrap().insert(revision.to_string());
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    /// Delay loads of `revision` only, overriding [`with_delay`](Self::with_delay).
    pub fn with_revision_delay(self, revision: &str, delay: Duration) -> Self {
        self.revision_delays
            .lock()
            .unwrap()
            .insert(revision.to_string(), delay);
        self
    }

    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Repository for FakeRepository {
    async fn clone_or_fetch(&self, _repo_path: &Path, _repo_url: &str, _reference: &str) -> Result<(), EdgeSyncError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resolve_revision(&self, _repo_path: &Path, reference: &str) -> Result<String, EdgeSyncError> {
        let refs = self.refs.lock().unwrap();
        refs.get(reference)
            .cloned()
            .ok_or_else(|| EdgeSyncError::dependency(SyncStep::Repository, format!("unknown ref {reference}")))
    }

    async fn create_manifest_for_files(
        &self,
        _repo_path: &Path,
        revision: &str,
        filter: &(dyn for<'a> Fn(&'a str) -> bool + Send + Sync),
    ) -> Result<RevisionManifest, EdgeSyncError> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        let revisions = self.revisions.lock().unwrap();
        let files = revisions
            .get(revision)
            .ok_or_else(|| EdgeSyncError::dependency(SyncStep::Repository, format!("unknown revision {revision}")))?;
        Ok(files
            .iter()
            .filter(|(name, _)| filter(name))
            .map(|(name, data)| (name.clone(), FileVersion::new(revision, self.compute_hash(data))))
            .collect())
    }

    async fn load_commit_files(
        &self,
        _repo_path: &Path,
        _repo_url: &str,
        revision: &str,
        filenames: &[String],
        sink: &dyn FileSink,
    ) -> Result<(), EdgeSyncError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self
            .revision_delays
            .lock()
            .unwrap()
            .get(revision)
            .copied()
            .or(*self.delay.lock().unwrap());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.stream_files(revision, filenames, sink).await;
        self.completed.lock().unwrap().push(revision.to_string());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl FakeRepository {
    async fn stream_files(&self, revision: &str, filenames: &[String], sink: &dyn FileSink) -> Result<(), EdgeSyncError> {
        if self.failing.lock().unwrap().contains(revision) {
            return Err(EdgeSyncError::dependency(SyncStep::Repository, format!("revision {revision} unavailable")));
        }
        let files: Vec<(String, Vec<u8>)> = {
            let revisions = self.revisions.lock().unwrap();
            let tree = revisions.get(revision).cloned().unwrap_or_default();
            filenames
                .iter()
                .map(|name| {
                    tree.get(name)
                        .map(|data| (name.clone(), data.clone()))
                        .ok_or_else(|| EdgeSyncError::dependency(SyncStep::Repository, format!("{name} not in {revision}")))
                })
                .collect::<Result<_, _>>()?
        };
        for (name, data) in files {
            let mut reader: &[u8] = &data;
            sink.accept(&name, &mut reader).await?;
        }
        Ok(())
    }
}

/// Replica that serves files straight from the local static directory, the
/// way a CDN pulls from origin after a purge.
pub struct FakeReplica {
    origin: PathBuf,
    fail_purge: Mutex<HashSet<String>>,
    fail_fetch: Mutex<HashSet<String>>,
    tamper: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeReplica {
    pub fn new(origin: &Path) -> Self {
        Self {
            origin: origin.to_path_buf(),
            fail_purge: Mutex::new(HashSet::new()),
            fail_fetch: Mutex::new(HashSet::new()),
            tamper: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_purge(self, host: &str) -> Self {
        self.fail_purge.lock().unwrap().insert(host.to_string());
        self
    }

    pub fn failing_fetch(self, host: &str) -> Self {
        self.fail_fetch.lock().unwrap().insert(host.to_string());
        self
    }

    pub fn tampering(self, host: &str) -> Self {
        self.tamper.lock().unwrap().insert(host.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn split(url: &str) -> (String, String) {
        let rest = url.trim_start_matches("http://");
        match rest.find('/') {
            Some(i) => (rest[..i].to_string(), rest[i..].to_string()),
            None => (rest.to_string(), "/".to_string()),
        }
    }
}

#[async_trait]
impl ReplicaClient for FakeReplica {
    async fn purge(&self, url: &str) -> Result<(), EdgeSyncError> {
        self.calls.lock().unwrap().push(format!("PURGE {url}"));
        let (host, _) = Self::split(url);
        if self.fail_purge.lock().unwrap().contains(&host) {
            return Err(EdgeSyncError::dependency(SyncStep::Purge, format!("{host} refused purge")));
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, EdgeSyncError> {
        self.calls.lock().unwrap().push(format!("GET {url}"));
        let (host, path) = Self::split(url);
        if self.fail_fetch.lock().unwrap().contains(&host) {
            return Err(EdgeSyncError::dependency(SyncStep::Fetch, format!("{host} returned 503")));
        }
        let mut data = std::fs::read(self.origin.join(path.trim_start_matches('/')))
            .map_err(|e| EdgeSyncError::dependency(SyncStep::Fetch, e.to_string()))?;
        if self.tamper.lock().unwrap().contains(&host) {
            data.extend_from_slice(b"<!-- injected -->");
        }
        Ok(data)
    }
}

/// Resolver answering from a fixed set of reachable hosts.
pub struct FakeResolver {
    reachable: HashSet<String>,
}

impl FakeResolver {
    pub fn new(hosts: &[&str]) -> Self {
        Self {
            reachable: hosts.iter().map(|h| h.to_string()).collect(),
        }
    }
}

#[async_trait]
impl HostResolver for FakeResolver {
    async fn is_reachable(&self, host: &str) -> bool {
        self.reachable.contains(host)
    }
}
