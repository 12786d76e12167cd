//! Per-project settings shared by the engines and the HTTP layer.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{EdgeSyncError, Result};

/// A project served by this node.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Project {
    /// Clone URL of the source repository.
    pub repository: String,
    /// Value of the `Token` header that authorizes API calls for this project.
    #[serde(default)]
    pub token: String,
    /// Repository sub-directory holding the project's static files.
    #[serde(default)]
    pub static_path: String,
    /// Glob patterns (relative to `static_path`) that are never served.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Project {
    /// Strip `static_path` from a repository path, or `None` when the path
    /// lies outside of it.
    pub fn relative_to_static<'a>(&self, repo_filename: &'a str) -> Option<&'a str> {
        let prefix = self.static_path.trim_matches('/');
        if prefix.is_empty() {
            return Some(repo_filename);
        }
        repo_filename
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
    }

    /// Repository path of a file given relative to `static_path`.
    pub fn repo_filename(&self, filename: &str) -> String {
        let prefix = self.static_path.trim_matches('/');
        if prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{prefix}/{filename}")
        }
    }

    /// Whether `filename` (relative to `static_path`) matches an exclude glob.
    /// Malformed patterns are ignored.
    pub fn is_excluded(&self, filename: &str) -> bool {
        self.exclude.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|p| p.matches(filename))
                .unwrap_or(false)
        })
    }

    /// Manifest filter: inside `static_path` and not excluded.
    pub fn accepts(&self, repo_filename: &str) -> bool {
        self.relative_to_static(repo_filename)
            .map(|rel| !self.is_excluded(rel))
            .unwrap_or(false)
    }
}

/// All configured projects, keyed by name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Projects(BTreeMap<String, Project>);

impl Projects {
    pub fn new(projects: BTreeMap<String, Project>) -> Self {
        Self(projects)
    }

    /// Look a project up, reporting an unknown name as a client error.
    pub fn get(&self, name: &str) -> Result<&Project> {
        self.0
            .get(name)
            .ok_or_else(|| EdgeSyncError::Client(format!("project {name} not exists")))
    }

    /// Whether any project uses `token`.
    pub fn has_token(&self, token: &str) -> bool {
        !token.is_empty() && self.0.values().any(|p| p.token == token)
    }

    /// Check a presented token: none at all is unauthorized, one no project
    /// uses is forbidden.
    pub fn authorize(&self, token: Option<&str>) -> Result<()> {
        match token {
            None => Err(EdgeSyncError::Unauthorized(
                "Project auth token header required".to_string(),
            )),
            Some(token) if self.has_token(token) => Ok(()),
            Some(_) => Err(EdgeSyncError::Forbidden("Bad project auth token".to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
