use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Access statistics for one cached beatmap (`<beatmap_id>.osu`).
///
/// Serialized with the sidecar's camelCase field names:
/// `{ "beatmapId": 1, "accessCount": 2, "lastAccessed": 1700000000000 }`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeatmapCacheEntry {
    pub beatmap_id: u64,
    pub access_count: u64,
    /// Milliseconds since the unix epoch.
    #[serde(deserialize_with = "deserialize_millis")]
    pub last_accessed: u64,
}

impl BeatmapCacheEntry {
    /// Entry for a beatmap accessed for the first time at `now`.
    pub fn first_access(beatmap_id: u64, now: u64) -> Self {
        Self {
            beatmap_id,
            access_count: 1,
            last_accessed: now,
        }
    }

    /// Entry for a file found on disk without any recorded accesses.
    pub fn unaccessed(beatmap_id: u64, last_accessed: u64) -> Self {
        Self {
            beatmap_id,
            access_count: 0,
            last_accessed,
        }
    }

    pub fn record_access(&mut self, now: u64) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed = now;
    }
}

// Older sidecars may carry fractional timestamps (file access times with sub-millisecond
// precision). Accept them and truncate to whole milliseconds.
fn deserialize_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Int(u64),
        Float(f64),
    }

    match Millis::deserialize(deserializer)? {
        Millis::Int(value) => Ok(value),
        Millis::Float(value) if value.is_finite() && value >= 0.0 => Ok(value as u64),
        Millis::Float(value) => Err(D::Error::custom(format!(
            "invalid lastAccessed timestamp {value}"
        ))),
    }
}
