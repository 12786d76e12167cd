//! Versioned-file cache: manifest requests, warm-up fan-out and on-demand
//! fetches of `<name>.<rev>.<ext>` paths.

pub mod versioned_path;
pub mod engine;
pub mod service;

pub use engine::{GroupFailure, WarmupEngine, WarmupReport};
pub use service::VersionedFiles;
pub use versioned_path::VersionedPath;
