use crate::constants::REVISION_TOKEN_LEN;
use crate::error::{EdgeSyncError, Result};

/// A request path of the form `<base>.<rev>.<ext>`.
///
/// The revision token is always the second-to-last dot-separated segment and
/// must be exactly seven word characters; the extension is the last segment.
/// Everything before the token is the base name, dots included, so
/// `jquery.min.abc1234.js` names `jquery.min.js` at revision `abc1234`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedPath {
    /// Path with the revision token removed.
    pub filename: String,
    pub revision: String,
}

impl VersionedPath {
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = || {
            EdgeSyncError::Client(format!(
                "filename validation failed, {path} doesn't match <name>.<rev:{REVISION_TOKEN_LEN}>.<ext>"
            ))
        };

        let mut segments = path.rsplitn(3, '.');
        let ext = segments.next().ok_or_else(invalid)?;
        let revision = segments.next().ok_or_else(invalid)?;
        let base = segments.next().ok_or_else(invalid)?;

        if base.is_empty() || base.ends_with('/') || !is_word(ext) || ext.is_empty() {
            return Err(invalid());
        }
        if revision.chars().count() != REVISION_TOKEN_LEN || !is_word(revision) {
            return Err(invalid());
        }

        Ok(Self {
            filename: format!("{base}.{ext}"),
            revision: revision.to_string(),
        })
    }
}

fn is_word(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
