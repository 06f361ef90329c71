use anyhow::{Context, Result};
use beatmap_cache::CacheConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Contents of a `beatmap-cache.toml` file.
///
/// ```toml
/// [cache]
/// cache_dir = "/srv/pp/cache"
/// max_size_bytes = 5368709120
/// max_files = 100000
///
/// [logging]
/// level = "info"
/// json = false
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// A level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    pub level: String,
    /// Emit JSON log lines instead of human-readable ones.
    pub json: bool,
}

const DEFAULT_LOG_LEVEL: &str = "info";

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_owned(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// `RUST_LOG` when it is set and valid, the configured level otherwise.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| self.configured_filter())
    }

    fn configured_filter(&self) -> EnvFilter {
        let level = match self.level.trim() {
            "" => DEFAULT_LOG_LEVEL,
            level => level,
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
    }
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }
}

/// Installs the global tracing subscriber. Logs always go to stderr so command output on
/// stdout stays machine-readable.
pub fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(logging.env_filter())
        .with_writer(std::io::stderr);
    // A subscriber may already be installed (e.g. when embedded); keep it.
    let _ = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
