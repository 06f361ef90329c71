//! Disk-backed LFU cache for downloaded beatmap files.
//!
//! A cache directory holds one `<id>.osu` file per cached beatmap plus a JSON sidecar with
//! per-beatmap access statistics. [`BeatmapCache`] keeps both bounded: at most
//! [`CacheConfig::max_files`] beatmaps and at most [`CacheConfig::max_size_bytes`] bytes of
//! beatmap files. When either bound is exceeded the least frequently accessed beatmap is
//! evicted (ties go to the least recently accessed one) and its file is deleted.
//!
//! ## On-disk layout
//!
//! - `<cache_dir>/<id>.osu`: cached beatmaps, produced by whatever fetched them
//! - `<cache_dir>/cache-metadata.json`: [`CacheMetadata`], rewritten after every access:
//!
//! ```json
//! {
//!   "75": { "beatmapId": 75, "accessCount": 3, "lastAccessed": 1700000000000 }
//! }
//! ```
//!
//! On open, files without a sidecar entry are indexed with `accessCount = 0` and their
//! filesystem access time, and sidecar entries without a file are dropped.

mod cache;
mod config;
mod entry;
mod error;
mod metadata;
mod queue;
mod util;

pub use cache::{AccessOutcome, BeatmapCache, CacheStats, SharedBeatmapCache};
pub use config::{
    CacheConfig, CACHE_DIR_ENV, DEFAULT_CACHE_DIR, DEFAULT_MAX_FILES, DEFAULT_MAX_SIZE_BYTES,
    MAX_FILES_ENV, MAX_SIZE_ENV,
};
pub use entry::BeatmapCacheEntry;
pub use error::{CacheError, EvictionFailure, MetadataLoadError, Result};
pub use metadata::{
    beatmap_file_name, parse_beatmap_file_name, CacheMetadata, BEATMAP_EXTENSION,
    CACHE_METADATA_FILENAME,
};
pub use queue::{IndexedMinHeap, Keyed};
pub use util::{atomic_write, now_millis};
