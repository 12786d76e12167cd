//! Revision manifests (JSON) and their on-disk cache.

pub mod revision_manifest;
pub mod serialization;
pub mod cache;

pub use cache::ManifestCache;
pub use revision_manifest::{FileVersion, RevisionGroups, RevisionManifest};
