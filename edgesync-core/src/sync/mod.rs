pub mod engine;
pub mod lock;
pub mod policy;

pub use engine::{SyncEngine, SyncFailure, SyncReport};
pub use lock::FileLocks;
pub use policy::FailurePolicy;
