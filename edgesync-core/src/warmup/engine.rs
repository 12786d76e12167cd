use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{EdgeSyncError, Result};
use crate::manifest::RevisionManifest;
use crate::paths::PathResolver;
use crate::project::{Project, Projects};
use crate::sync::policy::FailurePolicy;
use crate::traits::{ByteStream, FileSink, FileStore, Repository};
use crate::warmup::versioned_path::VersionedPath;

/// A revision group that could not be warmed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GroupFailure {
    pub revision: String,
    pub error: String,
}

/// Outcome of a warm-up run.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct WarmupReport {
    /// Revisions whose files are all in the cache.
    pub warmed: Vec<String>,
    pub failed: Vec<GroupFailure>,
    /// Number of files written to the cache.
    pub files: usize,
}

/// Populates `cache_dir/<project>/` from the repository, one task per
/// revision group with at most `concurrency` groups in flight.
#[derive(Clone)]
pub struct WarmupEngine {
    repository: Arc<dyn Repository>,
    fs: Arc<dyn FileStore>,
    paths: PathResolver,
    projects: Arc<Projects>,
    permits: Arc<Semaphore>,
}

impl WarmupEngine {
    pub fn new(
        repository: Arc<dyn Repository>,
        fs: Arc<dyn FileStore>,
        paths: PathResolver,
        projects: Arc<Projects>,
        concurrency: usize,
    ) -> Self {
        Self {
            repository,
            fs,
            paths,
            projects,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Fetch every file of `manifest` into the versioned cache.
    ///
    /// All groups are joined before returning. Under `BestEffort` a failed
    /// group is logged and reported while the others complete; under
    /// `FailFast` the first failure cancels the outstanding groups and is
    /// returned as the error.
    pub async fn warmup(
        &self,
        project_name: &str,
        manifest: &RevisionManifest,
        policy: FailurePolicy,
    ) -> Result<WarmupReport> {
        let project = self.projects.get(project_name)?.clone();
        let repo_path = self.paths.repo_dir(project_name)?;
        let groups = manifest.group_by_commits();

        info!(
            project = project_name,
            revisions = groups.len(),
            files = manifest.len(),
            "warming up manifest"
        );

        let mut tasks = JoinSet::new();
        for (revision, filenames) in groups {
            let expected = filenames
                .iter()
                .filter_map(|name| {
                    let hash = manifest.get(name)?.content_hash();
                    (!hash.is_empty()).then(|| (name.clone(), hash.to_string()))
                })
                .collect();

            let group = GroupFetch {
                repository: self.repository.clone(),
                sink: CacheSink {
                    repository: self.repository.clone(),
                    fs: self.fs.clone(),
                    paths: self.paths.clone(),
                    project_name: project_name.to_string(),
                    project: project.clone(),
                    expected,
                    written: AtomicUsize::new(0),
                },
                repo_path: repo_path.clone(),
                revision: revision.clone(),
                filenames,
            };
            let permits = self.permits.clone();

            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => group.run().await,
                    Err(e) => Err(EdgeSyncError::Storage(format!("warm-up pool closed: {e}"))),
                };
                (revision, result)
            });
        }

        let mut report = WarmupReport::default();
        while let Some(joined) = tasks.join_next().await {
            let (revision, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(project = project_name, error = %e, "warm-up task aborted");
                    if policy.is_fail_fast() {
                        tasks.abort_all();
                        return Err(EdgeSyncError::Storage(format!("warm-up task aborted: {e}")));
                    }
                    report.failed.push(GroupFailure {
                        revision: String::new(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            match result {
                Ok(written) => {
                    debug!(project = project_name, revision = %revision, files = written, "revision group warmed");
                    report.files += written;
                    report.warmed.push(revision);
                }
                Err(e) => {
                    warn!(project = project_name, revision = %revision, error = %e, "revision group warm-up failed");
                    if policy.is_fail_fast() {
                        tasks.abort_all();
                        return Err(e);
                    }
                    report.failed.push(GroupFailure {
                        revision,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.warmed.sort();
        report.failed.sort_by(|a, b| a.revision.cmp(&b.revision));
        info!(
            project = project_name,
            warmed = report.warmed.len(),
            failed = report.failed.len(),
            files = report.files,
            "warm-up finished"
        );
        Ok(report)
    }

    /// Fetch one `<name>.<rev>.<ext>` file into the cache and return its bytes.
    ///
    /// The repository is refreshed first; a refresh failure is only logged
    /// since the revision may already be present locally.
    pub async fn get_uncached_file(&self, project_name: &str, request_path: &str) -> Result<Vec<u8>> {
        let versioned = VersionedPath::parse(request_path)?;
        let project = self.projects.get(project_name)?.clone();
        if project.is_excluded(&versioned.filename) {
            return Err(EdgeSyncError::Client(format!(
                "file in exclude list: {}",
                versioned.filename
            )));
        }

        let repo_path = self.paths.repo_dir(project_name)?;
        if let Err(e) = self
            .repository
            .clone_or_fetch(&repo_path, &project.repository, &versioned.revision)
            .await
        {
            warn!(project = project_name, revision = %versioned.revision, error = %e, "repository refresh failed");
        }

        let cache_path = self.paths.file_cache_path(project_name, &versioned.filename)?;
        let group = GroupFetch {
            repository: self.repository.clone(),
            sink: CacheSink {
                repository: self.repository.clone(),
                fs: self.fs.clone(),
                paths: self.paths.clone(),
                project_name: project_name.to_string(),
                project: project.clone(),
                expected: BTreeMap::new(),
                written: AtomicUsize::new(0),
            },
            repo_path,
            revision: versioned.revision.clone(),
            filenames: vec![project.repo_filename(&versioned.filename)],
        };
        group.run().await?;

        debug!(project = project_name, path = %cache_path.display(), "serving freshly cached file");
        self.fs.read_file(&cache_path).await
    }
}

/// One revision group's worth of work, owned so it can move into a task.
struct GroupFetch {
    repository: Arc<dyn Repository>,
    sink: CacheSink,
    repo_path: PathBuf,
    revision: String,
    filenames: Vec<String>,
}

impl GroupFetch {
    async fn run(self) -> Result<usize> {
        self.repository
            .load_commit_files(
                &self.repo_path,
                &self.sink.project.repository,
                &self.revision,
                &self.filenames,
                &self.sink,
            )
            .await?;
        Ok(self.sink.written.load(Ordering::SeqCst))
    }
}

/// Streams repository files into the versioned cache.
struct CacheSink {
    repository: Arc<dyn Repository>,
    fs: Arc<dyn FileStore>,
    paths: PathResolver,
    project_name: String,
    project: Project,
    /// Expected content hash per repository filename, when the manifest has one.
    expected: BTreeMap<String, String>,
    written: AtomicUsize,
}

#[async_trait]
impl FileSink for CacheSink {
    async fn accept(&self, filename: &str, reader: ByteStream<'_>) -> Result<()> {
        let relative = self.project.relative_to_static(filename).ok_or_else(|| {
            EdgeSyncError::Client(format!("{filename} is outside the project's static path"))
        })?;
        let path = self.paths.file_cache_path(&self.project_name, relative)?;
        if let Some(parent) = path.parent() {
            self.fs.mkdir_all(parent).await?;
        }

        self.fs.write_stream(&path, reader).await?;

        if let Some(expected) = self.expected.get(filename) {
            let written = self.fs.read_file(&path).await?;
            let actual = self.repository.compute_hash(&written);
            if &actual != expected {
                if let Err(e) = self.fs.remove(&path).await {
                    warn!(path = %path.display(), error = %e, "can't remove mismatched cache file");
                }
                return Err(EdgeSyncError::Corruption(format!(
                    "{filename}: expected hash {expected}, got {actual}"
                )));
            }
        }

        self.written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncStep;
    use crate::manifest::FileVersion;
    use crate::paths::StorageRoots;
    use crate::project::Project;
    use crate::storage::LocalFs;
    use crate::testing::FakeRepository;
    use std::time::Duration;
    use tempfile::TempDir;

    fn projects(static_path: &str) -> Arc<Projects> {
        Arc::new(Projects::new(BTreeMap::from([(
            "web".to_string(),
            Project {
                repository: "ssh://git@repository.url:1022".to_string(),
                token: "t".to_string(),
                static_path: static_path.to_string(),
                exclude: vec!["*.secret".to_string()],
            },
        )])))
    }

    fn engine(dir: &TempDir, repo: Arc<FakeRepository>, static_path: &str, concurrency: usize) -> (WarmupEngine, PathResolver) {
        let paths = PathResolver::new(StorageRoots::under(dir.path()));
        let engine = WarmupEngine::new(repo, Arc::new(LocalFs::new()), paths.clone(), projects(static_path), concurrency);
        (engine, paths)
    }

    fn entry(repo: &FakeRepository, rev: &str, content: &[u8]) -> FileVersion {
        FileVersion::new(rev, repo.compute_hash(content))
    }

    #[tokio::test]
    async fn test_two_revisions_fetch_concurrently() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(
            FakeRepository::new()
                .with_file("aaaaaaa", "a.js", b"alpha")
                .with_file("bbbbbbb", "b.js", b"beta")
                .with_delay(Duration::from_millis(50)),
        );
        let (engine, paths) = engine(&dir, repo.clone(), "", 8);

        let manifest: RevisionManifest = [
            ("a.js".to_string(), entry(&repo, "aaaaaaa", b"alpha")),
            ("b.js".to_string(), entry(&repo, "bbbbbbb", b"beta")),
        ]
        .into_iter()
        .collect();

        let report = engine.warmup("web", &manifest, FailurePolicy::BestEffort).await.unwrap();

        assert_eq!(report.warmed, vec!["aaaaaaa".to_string(), "bbbbbbb".to_string()]);
        assert_eq!(report.files, 2);
        assert_eq!(repo.load_calls.load(Ordering::SeqCst), 2);
        assert_eq!(repo.max_in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(std::fs::read(paths.file_cache_path("web", "a.js").unwrap()).unwrap(), b"alpha");
        assert_eq!(std::fs::read(paths.file_cache_path("web", "b.js").unwrap()).unwrap(), b"beta");
    }

    #[tokio::test]
    async fn test_later_group_may_finish_first() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(
            FakeRepository::new()
                .with_file("aaaaaaa", "a.js", b"alpha")
                .with_file("bbbbbbb", "b.js", b"beta")
                .with_revision_delay("aaaaaaa", Duration::from_millis(150))
                .with_revision_delay("bbbbbbb", Duration::from_millis(5)),
        );
        let (engine, paths) = engine(&dir, repo.clone(), "", 8);
        let manifest: RevisionManifest = [
            ("a.js".to_string(), entry(&repo, "aaaaaaa", b"alpha")),
            ("b.js".to_string(), entry(&repo, "bbbbbbb", b"beta")),
        ]
        .into_iter()
        .collect();

        let report = engine.warmup("web", &manifest, FailurePolicy::FailFast).await.unwrap();

        assert_eq!(repo.completed(), vec!["bbbbbbb".to_string(), "aaaaaaa".to_string()]);
        assert_eq!(report.warmed, vec!["aaaaaaa".to_string(), "bbbbbbb".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(std::fs::read(paths.file_cache_path("web", "a.js").unwrap()).unwrap(), b"alpha");
        assert_eq!(std::fs::read(paths.file_cache_path("web", "b.js").unwrap()).unwrap(), b"beta");
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrency() {
        let dir = TempDir::new().unwrap();
        let mut repo = FakeRepository::new().with_delay(Duration::from_millis(20));
        let mut manifest = RevisionManifest::new();
        for i in 0..6 {
            let rev = format!("rev000{i}");
            let name = format!("f{i}.js");
            repo = repo.with_file(&rev, &name, name.as_bytes());
            manifest.insert(name.clone(), FileVersion::new(rev, ""));
        }
        let repo = Arc::new(repo);
        let (engine, _) = engine(&dir, repo.clone(), "", 2);

        let report = engine.warmup("web", &manifest, FailurePolicy::BestEffort).await.unwrap();
        assert_eq!(report.warmed.len(), 6);
        assert!(repo.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_best_effort_keeps_successful_groups() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(
            FakeRepository::new()
                .with_file("aaaaaaa", "a.js", b"alpha")
                .with_file("bbbbbbb", "b.js", b"beta")
                .failing_revision("bbbbbbb"),
        );
        let (engine, paths) = engine(&dir, repo.clone(), "", 4);
        let manifest: RevisionManifest = [
            ("a.js".to_string(), entry(&repo, "aaaaaaa", b"alpha")),
            ("b.js".to_string(), entry(&repo, "bbbbbbb", b"beta")),
        ]
        .into_iter()
        .collect();

        let report = engine.warmup("web", &manifest, FailurePolicy::BestEffort).await.unwrap();
        assert_eq!(report.warmed, vec!["aaaaaaa".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].revision, "bbbbbbb");
        assert!(paths.file_cache_path("web", "a.js").unwrap().exists());
        assert!(!paths.file_cache_path("web", "b.js").unwrap().exists());

        let err = engine.warmup("web", &manifest, FailurePolicy::FailFast).await.unwrap_err();
        assert_eq!(err.step(), Some(SyncStep::Repository));
    }

    #[tokio::test]
    async fn test_hash_mismatch_removes_cached_file() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(FakeRepository::new().with_file("aaaaaaa", "a.js", b"alpha"));
        let (engine, paths) = engine(&dir, repo, "", 4);
        let manifest: RevisionManifest = [("a.js".to_string(), FileVersion::new("aaaaaaa", "deadbeef"))]
            .into_iter()
            .collect();

        let report = engine.warmup("web", &manifest, FailurePolicy::BestEffort).await.unwrap();
        assert!(report.warmed.is_empty());
        assert!(report.failed[0].error.contains("expected hash deadbeef"));
        assert!(!paths.file_cache_path("web", "a.js").unwrap().exists());

        let err = engine.warmup("web", &manifest, FailurePolicy::FailFast).await.unwrap_err();
        assert!(matches!(err, EdgeSyncError::Corruption(_)));
    }

    #[tokio::test]
    async fn test_static_path_is_stripped_in_cache() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(FakeRepository::new().with_file("aaaaaaa", "public/css/app.css", b"body{}"));
        let (engine, paths) = engine(&dir, repo, "public", 4);
        let manifest: RevisionManifest = [("public/css/app.css".to_string(), FileVersion::new("aaaaaaa", ""))]
            .into_iter()
            .collect();

        engine.warmup("web", &manifest, FailurePolicy::FailFast).await.unwrap();
        assert_eq!(
            std::fs::read(paths.file_cache_path("web", "css/app.css").unwrap()).unwrap(),
            b"body{}"
        );
    }

    #[tokio::test]
    async fn test_get_uncached_file() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(FakeRepository::new().with_file("ab12cd3", "public/name.ext", b"payload"));
        let (engine, paths) = engine(&dir, repo.clone(), "public", 4);

        let bytes = engine.get_uncached_file("web", "name.ab12cd3.ext").await.unwrap();
        assert_eq!(bytes, b"payload");
        assert_eq!(repo.fetch_calls.load(Ordering::SeqCst), 1);
        assert!(paths.file_cache_path("web", "name.ext").unwrap().exists());

        let err = engine.get_uncached_file("web", "name.ab12cd.ext").await.unwrap_err();
        assert!(matches!(err, EdgeSyncError::Client(_)));

        let err = engine.get_uncached_file("web", "key.abcdef1.secret").await.unwrap_err();
        assert!(matches!(err, EdgeSyncError::Client(_)));

        let err = engine.get_uncached_file("nope", "name.ab12cd3.ext").await.unwrap_err();
        assert!(matches!(err, EdgeSyncError::Client(_)));
    }
}
