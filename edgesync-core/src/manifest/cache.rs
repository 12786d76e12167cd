use std::sync::Arc;

use tracing::{debug, warn};

use crate::constants::MANIFEST_CACHE_EXT;
use crate::error::EdgeSyncError;
use crate::manifest::RevisionManifest;
use crate::paths::PathResolver;
use crate::traits::FileStore;

/// Persisted manifests, one record per `(project, revision)`.
///
/// Records are written once and never mutated. A record that fails to parse
/// is deleted and treated as absent, so callers never see a corrupt cache.
#[derive(Clone)]
pub struct ManifestCache {
    fs: Arc<dyn FileStore>,
    paths: PathResolver,
}

impl ManifestCache {
    pub fn new(fs: Arc<dyn FileStore>, paths: PathResolver) -> Self {
        Self { fs, paths }
    }

    /// Revisions that have a record for `project`. Creates the project cache
    /// directory when missing; listing failures yield an empty set.
    pub async fn cached_revisions(&self, project: &str) -> Vec<String> {
        let dir = match self.paths.manifest_cache_dir(project) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(project, error = %e, "bad manifest cache dir");
                return Vec::new();
            }
        };

        if let Err(e) = self.fs.mkdir_all(&dir).await {
            warn!(project, error = %e, "can't create manifest cache dir");
            return Vec::new();
        }

        let suffix = format!(".{MANIFEST_CACHE_EXT}");
        match self.fs.list_dir(&dir).await {
            Ok(names) => names
                .into_iter()
                .filter_map(|name| name.strip_suffix(&suffix).map(String::from))
                .collect(),
            Err(e) => {
                warn!(project, error = %e, "can't list saved manifests");
                Vec::new()
            }
        }
    }

    /// Load the record for `(project, revision)`.
    pub async fn lookup(&self, project: &str, revision: &str) -> Option<RevisionManifest> {
        let path = self.paths.manifest_cache_path(project, revision).ok()?;

        let data = match self.fs.read_file(&path).await {
            Ok(data) => data,
            Err(EdgeSyncError::NotFound(_)) => return None,
            Err(e) => {
                warn!(project, revision, error = %e, "can't read saved manifest");
                return None;
            }
        };

        match parse_record(&data) {
            Ok(manifest) => {
                debug!(project, revision, files = manifest.len(), "manifest cache hit");
                Some(manifest)
            }
            Err(e) => {
                warn!(project, revision, error = %e, "removing manifest record");
                if let Err(e) = self.fs.remove(&path).await {
                    warn!(project, revision, error = %e, "can't remove corrupt manifest record");
                }
                None
            }
        }
    }

    /// Write the record for `(project, revision)`. Failures are logged only.
    pub async fn store(&self, project: &str, revision: &str, manifest: &RevisionManifest) {
        if let Err(e) = self.try_store(project, revision, manifest).await {
            warn!(project, revision, error = %e, "can't save manifest to cache");
        }
    }

    async fn try_store(
        &self,
        project: &str,
        revision: &str,
        manifest: &RevisionManifest,
    ) -> Result<(), EdgeSyncError> {
        let path = self.paths.manifest_cache_path(project, revision)?;
        if let Some(parent) = path.parent() {
            self.fs.mkdir_all(parent).await?;
        }
        let data = manifest.to_json()?;
        self.fs.write_file(&path, &data).await?;
        debug!(project, revision, files = manifest.len(), "manifest cached");
        Ok(())
    }

    /// Fill gaps in `manifest` from the record cached for `base_revision`.
    /// Entries of `manifest` always win; a missing or corrupt record leaves
    /// it unchanged.
    pub async fn merge_with_cached(
        &self,
        manifest: RevisionManifest,
        project: &str,
        base_revision: &str,
    ) -> RevisionManifest {
        match self.lookup(project, base_revision).await {
            Some(cached) => manifest.assign(cached),
            None => manifest,
        }
    }
}

fn parse_record(data: &[u8]) -> Result<RevisionManifest, EdgeSyncError> {
    RevisionManifest::from_json(data).map_err(|e| EdgeSyncError::Corruption(e.to_string()))
}
