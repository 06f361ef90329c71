use crate::config::CacheConfig;
use crate::entry::BeatmapCacheEntry;
use crate::error::{CacheError, EvictionFailure, Result};
use crate::metadata::{
    beatmap_file_name, parse_beatmap_file_name, read_metadata, write_metadata, CacheMetadata,
    CACHE_METADATA_FILENAME,
};
use crate::queue::{IndexedMinHeap, Keyed};
use crate::util::{file_timestamp_millis, now_millis, remove_file_best_effort, TMP_FILE_MARKER};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

type EvictionQueue = IndexedMinHeap<QueuedBeatmap, fn(&QueuedBeatmap, &QueuedBeatmap) -> Ordering>;

/// Queue item: the persisted entry plus the in-memory sequence number of its latest access.
///
/// Entries indexed at load carry sequence 0; every recorded access takes the next one.
#[derive(Clone, Copy, Debug)]
struct QueuedBeatmap {
    entry: BeatmapCacheEntry,
    access_seq: u64,
}

impl Keyed for QueuedBeatmap {
    type Key = u64;

    fn key(&self) -> u64 {
        self.entry.beatmap_id
    }
}

/// Eviction order: fewest accesses first, then least recently accessed. Accesses within the
/// same millisecond are ordered by when they were recorded, and only entries that never
/// were accessed through this instance fall back to their id.
fn eviction_order(a: &QueuedBeatmap, b: &QueuedBeatmap) -> Ordering {
    a.entry
        .access_count
        .cmp(&b.entry.access_count)
        .then_with(|| a.entry.last_accessed.cmp(&b.entry.last_accessed))
        .then_with(|| a.access_seq.cmp(&b.access_seq))
        .then_with(|| a.entry.beatmap_id.cmp(&b.entry.beatmap_id))
}

#[derive(Clone, Copy, Debug)]
struct IndexedBeatmap {
    entry: BeatmapCacheEntry,
    size_bytes: u64,
}

/// Result of [`BeatmapCache::access_beatmap`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccessOutcome {
    /// The entry after the access was recorded. If the access itself pushed the cache over
    /// its bounds this entry may already have been evicted.
    pub entry: BeatmapCacheEntry,
    /// Ids evicted by this call, in eviction order.
    pub evicted: Vec<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub cache_dir: PathBuf,
    pub entries: usize,
    pub total_bytes: u64,
    pub max_files: usize,
    pub max_size_bytes: u64,
}

#[derive(Debug, Default)]
struct Eviction {
    evicted: Vec<u64>,
    failures: Vec<EvictionFailure>,
}

/// LFU cache over the `<id>.osu` files of one directory.
///
/// Every mutating call leaves the cache within both bounds (`max_files` entries and
/// `max_size_bytes` bytes of indexed files) and rewrites `cache-metadata.json`.
///
/// Eviction removes the entry with the fewest recorded accesses, breaking ties by the oldest
/// `last_accessed`.
#[derive(Debug)]
pub struct BeatmapCache {
    config: CacheConfig,
    metadata_path: PathBuf,
    index: HashMap<u64, IndexedBeatmap>,
    queue: EvictionQueue,
    total_bytes: u64,
    access_seq: u64,
}

impl BeatmapCache {
    /// Loads the cache rooted at `config.cache_dir`.
    ///
    /// Every `<id>.osu` file in the directory is indexed, using its persisted statistics when
    /// the sidecar has them and an unaccessed entry stamped with the file's timestamp
    /// otherwise. A missing directory yields an empty cache.
    pub fn open(config: CacheConfig) -> Result<Self> {
        let metadata_path = config.cache_dir.join(CACHE_METADATA_FILENAME);
        let mut cache = Self {
            config,
            metadata_path,
            index: HashMap::new(),
            queue: IndexedMinHeap::new(
                eviction_order as fn(&QueuedBeatmap, &QueuedBeatmap) -> Ordering,
            ),
            total_bytes: 0,
            access_seq: 0,
        };
        cache.load()?;
        Ok(cache)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    pub fn beatmap_path(&self, beatmap_id: u64) -> PathBuf {
        self.config.cache_dir.join(beatmap_file_name(beatmap_id))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, beatmap_id: u64) -> bool {
        self.index.contains_key(&beatmap_id)
    }

    pub fn entry(&self, beatmap_id: u64) -> Option<BeatmapCacheEntry> {
        self.index.get(&beatmap_id).map(|indexed| indexed.entry)
    }

    /// All entries, ordered by id.
    pub fn entries(&self) -> Vec<BeatmapCacheEntry> {
        let mut entries: Vec<_> = self.index.values().map(|indexed| indexed.entry).collect();
        entries.sort_unstable_by_key(|entry| entry.beatmap_id);
        entries
    }

    /// All entries, next eviction victim first.
    pub fn eviction_candidates(&self) -> Vec<BeatmapCacheEntry> {
        let mut queued: Vec<_> = self.queue.iter().copied().collect();
        queued.sort_unstable_by(eviction_order);
        queued.into_iter().map(|queued| queued.entry).collect()
    }

    /// Summed size of all indexed beatmap files, as last observed on disk.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cache_dir: self.config.cache_dir.clone(),
            entries: self.index.len(),
            total_bytes: self.total_bytes,
            max_files: self.config.max_files,
            max_size_bytes: self.config.max_size_bytes,
        }
    }

    /// Records one access of `beatmap_id`, evicts until both bounds hold, then persists the
    /// metadata sidecar.
    ///
    /// Persistence failures are logged and do not fail the call; the in-memory index stays
    /// authoritative until the next successful write. Files that could not be deleted during
    /// eviction are reported as [`CacheError::EvictionIo`] after the sidecar was written.
    pub fn access_beatmap(&mut self, beatmap_id: u64) -> Result<AccessOutcome> {
        self.access_beatmap_at(beatmap_id, now_millis())
    }

    fn access_beatmap_at(&mut self, beatmap_id: u64, now: u64) -> Result<AccessOutcome> {
        let size_bytes = self.observed_size(beatmap_id);
        self.access_seq += 1;
        let access_seq = self.access_seq;

        let entry = match self.index.get_mut(&beatmap_id) {
            Some(indexed) => {
                indexed.entry.record_access(now);
                self.total_bytes = self
                    .total_bytes
                    .saturating_sub(indexed.size_bytes)
                    .saturating_add(size_bytes);
                indexed.size_bytes = size_bytes;
                self.queue.update(QueuedBeatmap {
                    entry: indexed.entry,
                    access_seq,
                });
                indexed.entry
            }
            None => {
                let entry = BeatmapCacheEntry::first_access(beatmap_id, now);
                self.index.insert(beatmap_id, IndexedBeatmap { entry, size_bytes });
                self.queue.insert(QueuedBeatmap {
                    entry,
                    access_seq,
                });
                self.total_bytes = self.total_bytes.saturating_add(size_bytes);
                entry
            }
        };

        tracing::debug!(
            target = "beatmap_cache",
            beatmap_id,
            access_count = entry.access_count,
            size_bytes,
            "recorded beatmap access"
        );

        let eviction = self.evict();
        self.persist_best_effort();

        if !eviction.failures.is_empty() {
            return Err(CacheError::EvictionIo {
                failures: eviction.failures,
            });
        }
        Ok(AccessOutcome {
            entry,
            evicted: eviction.evicted,
        })
    }

    /// Evicts until both bounds hold without recording an access, returning the evicted ids.
    ///
    /// The sidecar is only rewritten when something was evicted.
    pub fn enforce_limits(&mut self) -> Result<Vec<u64>> {
        let eviction = self.evict();
        if !eviction.evicted.is_empty() {
            self.persist_best_effort();
        }
        if !eviction.failures.is_empty() {
            return Err(CacheError::EvictionIo {
                failures: eviction.failures,
            });
        }
        Ok(eviction.evicted)
    }

    /// Writes the sidecar now, surfacing any failure.
    pub fn flush(&self) -> Result<()> {
        let metadata: CacheMetadata = self
            .index
            .iter()
            .map(|(&beatmap_id, indexed)| (beatmap_id, indexed.entry))
            .collect();
        write_metadata(&self.metadata_path, &metadata)
    }

    fn is_over_limits(&self) -> bool {
        self.index.len() > self.config.max_files || self.total_bytes > self.config.max_size_bytes
    }

    fn evict(&mut self) -> Eviction {
        let mut eviction = Eviction::default();

        while self.is_over_limits() {
            let Some(QueuedBeatmap { entry: victim, .. }) = self.queue.extract_min() else {
                break;
            };
            let beatmap_id = victim.beatmap_id;
            let size_bytes = self
                .index
                .remove(&beatmap_id)
                .map_or(0, |indexed| indexed.size_bytes);
            self.total_bytes = self.total_bytes.saturating_sub(size_bytes);

            let path = self.beatmap_path(beatmap_id);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(
                        target = "beatmap_cache",
                        beatmap_id,
                        access_count = victim.access_count,
                        last_accessed = victim.last_accessed,
                        size_bytes,
                        "evicted beatmap"
                    );
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(
                        target = "beatmap_cache",
                        beatmap_id,
                        path = %path.display(),
                        "evicted beatmap file was already gone"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        target = "beatmap_cache",
                        beatmap_id,
                        path = %path.display(),
                        error = %err,
                        "failed to delete evicted beatmap file"
                    );
                    eviction.failures.push(EvictionFailure {
                        beatmap_id,
                        path,
                        error: err,
                    });
                }
            }
            eviction.evicted.push(beatmap_id);
        }

        eviction
    }

    fn persist_best_effort(&self) {
        if let Err(err) = self.flush() {
            tracing::warn!(
                target = "beatmap_cache",
                path = %self.metadata_path.display(),
                error = %err,
                "failed to save cache metadata"
            );
        }
    }

    /// Current size of the beatmap's file. A missing file counts as empty.
    fn observed_size(&self, beatmap_id: u64) -> u64 {
        let path = self.beatmap_path(beatmap_id);
        match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(err) => {
                tracing::debug!(
                    target = "beatmap_cache",
                    beatmap_id,
                    path = %path.display(),
                    error = %err,
                    "failed to stat beatmap file; counting it as empty"
                );
                0
            }
        }
    }

    fn load(&mut self) -> Result<()> {
        let dir = self.config.cache_dir.clone();
        let mut persisted = read_metadata(&self.metadata_path)?.unwrap_or_default();

        let read_dir = match std::fs::read_dir(&dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(
                    target = "beatmap_cache",
                    cache_dir = %dir.display(),
                    "cache directory does not exist; starting with an empty cache"
                );
                return Ok(());
            }
            Err(err) => return Err(CacheError::metadata_load(&dir, err)),
        };

        let mut synthesized = 0usize;
        for dir_entry in read_dir {
            let dir_entry = dir_entry.map_err(|err| CacheError::metadata_load(&dir, err))?;
            let file_name = dir_entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };

            if file_name
                .strip_prefix(CACHE_METADATA_FILENAME)
                .is_some_and(|rest| rest.starts_with(TMP_FILE_MARKER))
            {
                // Left behind by an interrupted sidecar write.
                remove_file_best_effort(&dir_entry.path(), "load.stale_metadata_tmp");
                continue;
            }

            let Some(beatmap_id) = parse_beatmap_file_name(file_name) else {
                continue;
            };

            let path = dir_entry.path();
            let meta = match std::fs::metadata(&path) {
                Ok(meta) => meta,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(CacheError::metadata_load(&path, err)),
            };
            if !meta.is_file() {
                continue;
            }

            let entry = match persisted.remove(&beatmap_id) {
                Some(entry) => BeatmapCacheEntry {
                    beatmap_id,
                    ..entry
                },
                None => {
                    synthesized += 1;
                    BeatmapCacheEntry::unaccessed(beatmap_id, file_timestamp_millis(&meta))
                }
            };

            let size_bytes = meta.len();
            self.index
                .insert(beatmap_id, IndexedBeatmap { entry, size_bytes });
            self.queue.insert(QueuedBeatmap {
                entry,
                access_seq: 0,
            });
            self.total_bytes = self.total_bytes.saturating_add(size_bytes);
        }

        tracing::debug!(
            target = "beatmap_cache",
            cache_dir = %dir.display(),
            entries = self.index.len(),
            total_bytes = self.total_bytes,
            synthesized,
            dropped_stale = persisted.len(),
            "loaded beatmap cache"
        );
        Ok(())
    }
}

/// A [`BeatmapCache`] shared between threads.
///
/// Each call holds one lock for its whole read-modify-evict-persist sequence, which keeps
/// the bounds invariant under concurrent callers.
#[derive(Clone, Debug)]
pub struct SharedBeatmapCache {
    inner: Arc<Mutex<BeatmapCache>>,
}

impl SharedBeatmapCache {
    pub fn new(cache: BeatmapCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    pub fn open(config: CacheConfig) -> Result<Self> {
        BeatmapCache::open(config).map(Self::new)
    }

    pub fn access_beatmap(&self, beatmap_id: u64) -> Result<AccessOutcome> {
        self.lock().access_beatmap(beatmap_id)
    }

    pub fn enforce_limits(&self) -> Result<Vec<u64>> {
        self.lock().enforce_limits()
    }

    pub fn flush(&self) -> Result<()> {
        self.lock().flush()
    }

    pub fn entry(&self, beatmap_id: u64) -> Option<BeatmapCacheEntry> {
        self.lock().entry(beatmap_id)
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    /// Runs `f` with exclusive access to the cache.
    pub fn with<R>(&self, f: impl FnOnce(&mut BeatmapCache) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, BeatmapCache> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
