//! Content digests.
//!
//! Two digests are in play: the 128-bit MD5 that names content blobs, and the
//! git blob hash that repositories and replicas are verified against.

use md5::Md5;
use sha1::{Digest, Sha1};

/// Lowercase hex MD5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Git object id of `data` stored as a blob: SHA-1 over `blob <len>\0<data>`.
pub fn git_blob_hash(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", data.len()).as_bytes());
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// A digest usable as a file name: at least a bucket prefix long, hex only.
pub fn is_valid_digest(digest: &str) -> bool {
    digest.len() > crate::constants::DIGEST_BUCKET_LEN && digest.chars().all(|c| c.is_ascii_hexdigit())
}
