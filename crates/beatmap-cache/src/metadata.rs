use crate::entry::BeatmapCacheEntry;
use crate::error::{CacheError, MetadataLoadError};
use crate::util::atomic_write;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Name of the metadata sidecar inside the cache directory.
pub const CACHE_METADATA_FILENAME: &str = "cache-metadata.json";

/// Extension (without the dot) of cached beatmap files.
pub const BEATMAP_EXTENSION: &str = "osu";

/// Persisted access statistics, keyed by beatmap id.
///
/// Serializes as a JSON object with decimal string keys: `{"1": {"beatmapId": 1, ...}}`.
pub type CacheMetadata = BTreeMap<u64, BeatmapCacheEntry>;

pub fn beatmap_file_name(beatmap_id: u64) -> String {
    format!("{beatmap_id}.{BEATMAP_EXTENSION}")
}

/// Parses `<id>.osu` back into its id.
///
/// Only the canonical decimal spelling is accepted (`7.osu`, not `007.osu` or `+7.osu`), so
/// every parsed id maps back onto the same file name.
pub fn parse_beatmap_file_name(file_name: &str) -> Option<u64> {
    let stem = file_name
        .strip_suffix(BEATMAP_EXTENSION)?
        .strip_suffix('.')?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if stem.len() > 1 && stem.starts_with('0') {
        return None;
    }
    stem.parse().ok()
}

/// Reads the sidecar at `path`. A missing file is `Ok(None)`; anything else that prevents a
/// full read is an error.
pub(crate) fn read_metadata(path: &Path) -> Result<Option<CacheMetadata>, CacheError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(CacheError::metadata_load(path, err)),
    };

    let metadata: CacheMetadata = serde_json::from_slice(&bytes)
        .map_err(|err| CacheError::metadata_load(path, MetadataLoadError::Json(err)))?;
    Ok(Some(metadata))
}

pub(crate) fn write_metadata(path: &Path, metadata: &CacheMetadata) -> Result<(), CacheError> {
    let persist_err = |source: io::Error| CacheError::Persist {
        path: path.to_path_buf(),
        source,
    };

    let bytes = serde_json::to_vec_pretty(metadata).map_err(|err| persist_err(err.into()))?;
    atomic_write(path, &bytes).map_err(persist_err)
}
