//! Collaborator seams: everything the engines touch outside their own memory.

pub mod storage;
pub mod repository;
pub mod replica;

pub use replica::{HostResolver, ReplicaClient};
pub use repository::{ByteStream, FileSink, Repository};
pub use storage::{FileInfo, FileStore};
