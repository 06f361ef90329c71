use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced by cache loading, eviction and persistence.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache could not be loaded at startup. The cache refuses to run with a partially
    /// loaded index, so this is always fatal to `BeatmapCache::open`.
    #[error("failed to load beatmap cache from {path}: {source}")]
    MetadataLoad {
        path: PathBuf,
        #[source]
        source: MetadataLoadError,
    },

    #[error("failed to persist cache metadata to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more evicted beatmaps could not be removed from disk.
    ///
    /// The entries are already gone from the index when this is reported, and the metadata
    /// sidecar has been rewritten without them.
    #[error("failed to delete {} evicted beatmap file(s)", failures.len())]
    EvictionIo { failures: Vec<EvictionFailure> },

    #[error("invalid cache configuration: {message}")]
    Config { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataLoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid metadata json: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single evicted beatmap whose backing file could not be deleted.
#[derive(Debug, thiserror::Error)]
#[error("failed to delete {path} (beatmap {beatmap_id}): {error}")]
pub struct EvictionFailure {
    pub beatmap_id: u64,
    pub path: PathBuf,
    #[source]
    pub error: std::io::Error,
}

impl CacheError {
    pub(crate) fn metadata_load(
        path: impl Into<PathBuf>,
        source: impl Into<MetadataLoadError>,
    ) -> Self {
        Self::MetadataLoad {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eviction_error_reports_failure_count() {
        let err = CacheError::EvictionIo {
            failures: vec![
                EvictionFailure {
                    beatmap_id: 1,
                    path: PathBuf::from("cache/1.osu"),
                    error: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                },
                EvictionFailure {
                    beatmap_id: 2,
                    path: PathBuf::from("cache/2.osu"),
                    error: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                },
            ],
        };
        assert_eq!(err.to_string(), "failed to delete 2 evicted beatmap file(s)");
    }

    #[test]
    fn metadata_load_error_keeps_json_source() {
        let json_err = serde_json::from_str::<u64>("{").expect_err("expected parse error");
        let err = CacheError::metadata_load("cache/cache-metadata.json", json_err);
        let message = err.to_string();
        assert!(message.contains("cache-metadata.json"), "{message}");
        assert!(message.contains("invalid metadata json"), "{message}");
        assert!(std::error::Error::source(&err).is_some());
    }
}
