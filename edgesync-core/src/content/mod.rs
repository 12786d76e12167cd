//! Digest-addressed storage for arbitrary uploads.

pub mod hooks;
pub mod store;

pub use hooks::{DuplicateContent, DuplicateName, PostWriteHook, PreWriteHook, UploadHooks};
pub use store::ContentStore;
