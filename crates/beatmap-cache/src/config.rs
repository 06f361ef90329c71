use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;

pub const DEFAULT_MAX_SIZE_BYTES: u64 = 5 * 1024 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 100_000;
pub const DEFAULT_CACHE_DIR: &str = "cache";

pub const CACHE_DIR_ENV: &str = "BEATMAP_CACHE_DIR";
pub const MAX_SIZE_ENV: &str = "BEATMAP_CACHE_MAX_SIZE";
pub const MAX_FILES_ENV: &str = "BEATMAP_CACHE_MAX_FILES";

/// Location and capacity bounds of a beatmap cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Directory holding `<id>.osu` files and the metadata sidecar.
    pub cache_dir: PathBuf,
    /// Upper bound on the summed size of all indexed beatmap files.
    pub max_size_bytes: u64,
    /// Upper bound on the number of indexed beatmaps.
    pub max_files: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_max_size_bytes(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    /// Defaults overridden by `BEATMAP_CACHE_DIR`, `BEATMAP_CACHE_MAX_SIZE` and
    /// `BEATMAP_CACHE_MAX_FILES`.
    pub fn from_env() -> Result<Self, CacheError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), CacheError> {
        self.apply_env_with(|name| std::env::var_os(name))
    }

    /// Applies overrides using `lookup` in place of the process environment.
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<OsString>,
    ) -> Result<(), CacheError> {
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|dir| !dir.is_empty()) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(MAX_SIZE_ENV) {
            self.max_size_bytes = parse_env_number(MAX_SIZE_ENV, &value)?;
        }
        if let Some(value) = lookup(MAX_FILES_ENV) {
            self.max_files = parse_env_number(MAX_FILES_ENV, &value)?;
        }
        Ok(())
    }
}

fn parse_env_number<T: std::str::FromStr>(name: &str, value: &OsString) -> Result<T, CacheError> {
    let text = value
        .to_str()
        .ok_or_else(|| CacheError::config(format!("{name} is not valid UTF-8")))?;
    text.trim().parse().map_err(|_| {
        CacheError::config(format!(
            "{name} must be a non-negative integer, got {text:?}"
        ))
    })
}
