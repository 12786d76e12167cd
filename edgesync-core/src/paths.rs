//! On-disk layout and replica URLs.
//!
//! ```text
//! content_dir/<hash[:2]>/<hash>          content blobs
//! static_dir/<project>/<filename>        static store (upload/update)
//! cache_dir/<project>/<revision>.json    manifest cache records
//! cache_dir/<project>/<filename>         warmed versioned files
//! backup_dir/<project>/<filename>        rollback snapshots
//! repo_dir/<project>                     local repository copies
//! ```

use std::path::{Component, Path, PathBuf};

use crate::constants::{DIGEST_BUCKET_LEN, MANIFEST_CACHE_EXT, PURGE_PATH_PREFIX};
use crate::error::{EdgeSyncError, Result};
use crate::hash::is_valid_digest;

/// Storage directories, created at startup and injected into every engine.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRoots {
    /// Owned by the content store alone; project names never land here.
    pub content_dir: PathBuf,
    pub static_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub repo_dir: PathBuf,
}

impl StorageRoots {
    /// Lay the roots out under a single base directory.
    pub fn under(base: &Path) -> Self {
        Self {
            content_dir: base.join("content"),
            static_dir: base.join("static"),
            cache_dir: base.join("cache"),
            backup_dir: base.join("backup"),
            repo_dir: base.join("repos"),
        }
    }

    pub fn all(&self) -> [&Path; 5] {
        [&self.content_dir, &self.static_dir, &self.cache_dir, &self.backup_dir, &self.repo_dir]
    }
}

/// Pure path and URL construction over a set of [`StorageRoots`].
#[derive(Debug, Clone)]
pub struct PathResolver {
    roots: StorageRoots,
}

impl PathResolver {
    pub fn new(roots: StorageRoots) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &StorageRoots {
        &self.roots
    }

    pub fn repo_dir(&self, project: &str) -> Result<PathBuf> {
        Ok(self.roots.repo_dir.join(safe_relative(project)?))
    }

    pub fn manifest_cache_dir(&self, project: &str) -> Result<PathBuf> {
        Ok(self.roots.cache_dir.join(safe_relative(project)?))
    }

    pub fn manifest_cache_path(&self, project: &str, revision: &str) -> Result<PathBuf> {
        let name = format!("{}.{MANIFEST_CACHE_EXT}", safe_segment(revision)?);
        Ok(self.manifest_cache_dir(project)?.join(name))
    }

    pub fn file_cache_path(&self, project: &str, filename: &str) -> Result<PathBuf> {
        Ok(self.manifest_cache_dir(project)?.join(safe_relative(filename)?))
    }

    pub fn project_static_dir(&self, project: &str) -> Result<PathBuf> {
        Ok(self.roots.static_dir.join(safe_relative(project)?))
    }

    pub fn static_file_path(&self, project: &str, filename: &str) -> Result<PathBuf> {
        Ok(self.project_static_dir(project)?.join(safe_relative(filename)?))
    }

    pub fn backup_file_path(&self, project: &str, filename: &str) -> Result<PathBuf> {
        Ok(self
            .roots
            .backup_dir
            .join(safe_relative(project)?)
            .join(safe_relative(filename)?))
    }

    pub fn digest_dir(&self, digest: &str) -> Result<PathBuf> {
        if !is_valid_digest(digest) {
            return Err(EdgeSyncError::Client(format!("invalid digest: {digest}")));
        }
        Ok(self.roots.content_dir.join(&digest[..DIGEST_BUCKET_LEN]))
    }

    pub fn digest_path(&self, digest: &str) -> Result<PathBuf> {
        Ok(self.digest_dir(digest)?.join(digest))
    }
}

/// Path of a project file as served by the CDN.
pub fn cdn_path(project: &str, filename: &str) -> String {
    format!("/{}/{}", project.trim_matches('/'), filename.trim_start_matches('/'))
}

pub fn purge_url(host: &str, cdn_path: &str) -> String {
    format!("http://{host}{PURGE_PATH_PREFIX}{cdn_path}")
}

pub fn fetch_url(host: &str, cdn_path: &str) -> String {
    format!("http://{host}{cdn_path}")
}

/// Accept only plain relative paths: no root, no `..`, not empty.
fn safe_relative(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let mut clean = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => {
                return Err(EdgeSyncError::Client(format!("illegal path: {path}")));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(EdgeSyncError::Client("empty path".to_string()));
    }
    Ok(clean)
}

fn safe_segment(segment: &str) -> Result<&str> {
    if segment.is_empty() || segment.contains(['/', '\\']) || segment == "." || segment == ".." {
        return Err(EdgeSyncError::Client(format!("illegal path segment: {segment}")));
    }
    Ok(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new(StorageRoots {
            content_dir: PathBuf::from("/ContentDir"),
            static_dir: PathBuf::from("/StaticDir"),
            cache_dir: PathBuf::from("/CacheDir"),
            backup_dir: PathBuf::from("/BackupDir"),
            repo_dir: PathBuf::from("/RepoStorageDir"),
        })
    }

    #[test]
    fn test_layout() {
        let r = resolver();
        assert_eq!(r.repo_dir("web").unwrap(), PathBuf::from("/RepoStorageDir/web"));
        assert_eq!(
            r.manifest_cache_path("web", "commit-sha").unwrap(),
            PathBuf::from("/CacheDir/web/commit-sha.json")
        );
        assert_eq!(
            r.file_cache_path("web", "css/app.css").unwrap(),
            PathBuf::from("/CacheDir/web/css/app.css")
        );
        assert_eq!(
            r.static_file_path("web", "filename.ext").unwrap(),
            PathBuf::from("/StaticDir/web/filename.ext")
        );
        assert_eq!(
            r.backup_file_path("web", "filename.ext").unwrap(),
            PathBuf::from("/BackupDir/web/filename.ext")
        );
        assert_eq!(
            r.digest_path("d10b4c3ff123b26dc068d43a8bef2d23").unwrap(),
            PathBuf::from("/ContentDir/d1/d10b4c3ff123b26dc068d43a8bef2d23")
        );
    }

    #[test]
    fn test_hex_project_names_stay_out_of_digest_buckets() {
        let r = resolver();
        let digest = "d10b4c3ff123b26dc068d43a8bef2d23";
        let bucket = r.digest_dir(digest).unwrap();
        let project_dir = r.project_static_dir("d1").unwrap();
        assert!(!bucket.starts_with(&project_dir));
        assert!(!project_dir.starts_with(&bucket));
        assert_ne!(r.static_file_path("d1", digest).unwrap(), r.digest_path(digest).unwrap());
    }

    #[test]
    fn test_rejects_traversal() {
        let r = resolver();
        assert!(r.static_file_path("web", "../../etc/passwd").is_err());
        assert!(r.static_file_path("web", "/etc/passwd").is_err());
        assert!(r.static_file_path("..", "a.js").is_err());
        assert!(r.manifest_cache_path("web", "../x").is_err());
        assert!(r.digest_path("../../x").is_err());
    }

    #[test]
    fn test_replica_urls() {
        let path = cdn_path("web", "css/app.css");
        assert_eq!(path, "/web/css/app.css");
        assert_eq!(purge_url("cdn1.local", &path), "http://cdn1.local/purge/web/css/app.css");
        assert_eq!(fetch_url("cdn1.local:8080", &path), "http://cdn1.local:8080/web/css/app.css");
    }
}
