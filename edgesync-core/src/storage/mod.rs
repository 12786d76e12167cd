//! Native filesystem implementation of [`FileStore`](crate::traits::FileStore).

pub mod local_fs;

pub use local_fs::LocalFs;
