//! Manifest-driven distribution of versioned static assets.
//!
//! The library owns the storage layout, the revision manifest model, the cache
//! warm-up fan-out and the backup/rollback replica sync. Every I/O boundary
//! (git, filesystem, CDN replicas, DNS) is a trait in [`traits`] so the server
//! binary and the tests can plug in their own implementations.

pub mod error;
pub mod constants;
pub mod traits;
pub mod hash;
pub mod project;
pub mod paths;
pub mod manifest;
pub mod storage;
pub mod content;
pub mod warmup;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
