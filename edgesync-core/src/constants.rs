/// Number of word characters in the revision token of a versioned filename.
pub const REVISION_TOKEN_LEN: usize = 7;

/// Length of the directory prefix used to bucket content blobs.
pub const DIGEST_BUCKET_LEN: usize = 2;

/// Extension of a cached manifest record.
pub const MANIFEST_CACHE_EXT: &str = "json";

/// Default number of revision groups fetched at once during warm-up.
pub const DEFAULT_WARMUP_CONCURRENCY: usize = 8;

/// Path segment prepended to a CDN path to build its purge URL.
pub const PURGE_PATH_PREFIX: &str = "/purge";
