use serde::{de::DeserializeOwned, Serialize};

use crate::error::EdgeSyncError;

pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, EdgeSyncError> {
    serde_json::to_vec(value).map_err(|e| EdgeSyncError::Serialization(e.to_string()))
}

pub fn deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<T, EdgeSyncError> {
    serde_json::from_slice(data).map_err(|e| EdgeSyncError::Serialization(e.to_string()))
}
