use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EdgeSyncError;
use crate::manifest::serialization;

/// Expected state of one logical file: the commit that last touched it and
/// the hash of its content. Empty fields are left out of the JSON form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileVersion {
    #[serde(rename = "version", default, skip_serializing_if = "String::is_empty")]
    revision: String,
    #[serde(rename = "hash", default, skip_serializing_if = "String::is_empty")]
    content_hash: String,
}

impl FileVersion {
    pub fn new(revision: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            content_hash: content_hash.into(),
        }
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

/// Filenames grouped by the revision they must be loaded from.
pub type RevisionGroups = BTreeMap<String, Vec<String>>;

/// Mapping from logical filename to its [`FileVersion`].
///
/// Keys are kept sorted, so serialization is deterministic and a
/// parse/serialize/parse cycle always yields an equal manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct RevisionManifest {
    files: BTreeMap<String, FileVersion>,
}

impl RevisionManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manifest fragment returned by upload and update: one file, hash only.
    pub fn upload_fragment(filename: impl Into<String>, content_hash: impl Into<String>) -> Self {
        let mut manifest = Self::new();
        manifest.insert(filename, FileVersion::new(String::new(), content_hash));
        manifest
    }

    pub fn insert(&mut self, filename: impl Into<String>, version: FileVersion) -> Option<FileVersion> {
        self.files.insert(filename.into(), version)
    }

    pub fn get(&self, filename: &str) -> Option<&FileVersion> {
        self.files.get(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.files.contains_key(filename)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileVersion)> {
        self.files.iter().map(|(name, version)| (name.as_str(), version))
    }

    /// Partition every filename by its revision.
    pub fn group_by_commits(&self) -> RevisionGroups {
        let mut groups = RevisionGroups::new();
        for (filename, version) in &self.files {
            groups
                .entry(version.revision.clone())
                .or_default()
                .push(filename.clone());
        }
        groups
    }

    /// Merge `other` into this manifest. Entries already present here win;
    /// `other` only contributes filenames this manifest does not have.
    pub fn assign(mut self, other: RevisionManifest) -> RevisionManifest {
        for (filename, version) in other.files {
            self.files.entry(filename).or_insert(version);
        }
        self
    }

    pub fn to_json(&self) -> Result<Vec<u8>, EdgeSyncError> {
        serialization::serialize(self)
    }

    pub fn from_json(data: &[u8]) -> Result<Self, EdgeSyncError> {
        serialization::deserialize(data)
    }
}

impl FromIterator<(String, FileVersion)> for RevisionManifest {
    fn from_iter<I: IntoIterator<Item = (String, FileVersion)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}
