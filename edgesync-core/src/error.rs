use std::fmt;

use thiserror::Error;

/// The stage of a replica synchronization that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Backup,
    Write,
    Purge,
    Fetch,
    Verify,
    Repository,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStep::Backup => "backup",
            SyncStep::Write => "write",
            SyncStep::Purge => "purge",
            SyncStep::Fetch => "fetch",
            SyncStep::Verify => "verify",
            SyncStep::Repository => "repository",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum EdgeSyncError {
    /// Malformed input from the caller; never retried.
    #[error("Client error: {0}")]
    Client(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Repository or replica failure. `step` names where it happened.
    #[error("Dependency error during {step}: {message}")]
    Dependency { step: SyncStep, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt record: {0}")]
    Corruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EdgeSyncError {
    pub fn dependency(step: SyncStep, message: impl Into<String>) -> Self {
        EdgeSyncError::Dependency {
            step,
            message: message.into(),
        }
    }

    /// The failing sync step, if this is a dependency error.
    pub fn step(&self) -> Option<SyncStep> {
        match self {
            EdgeSyncError::Dependency { step, .. } => Some(*step),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EdgeSyncError>;
