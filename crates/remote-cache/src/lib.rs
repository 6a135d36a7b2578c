//! vidstack Remote Cache
//!
//! Resolves share links to local files so the rest of the pipeline only
//! ever sees paths:
//! - **Patterns:** A table of named regexes recognizes links and extracts
//!   the stable file identifier
//! - **Cache:** Downloads once, keyed by the MD5 of that identifier, and
//!   re-fetches entries that are stale or whose file is gone

pub mod cache;
pub mod patterns;

pub use cache::{
    cache_key, extension_for_content_type, CacheEntry, RemoteAssetCache, DEFAULT_MAX_AGE,
    DOWNLOAD_ENDPOINT, METADATA_FILE,
};
pub use patterns::{extract_file_id, is_remote_link};
