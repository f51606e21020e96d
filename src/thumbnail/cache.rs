//! Bounded thumbnail cache.
//!
//! One mutex guards the entry map, the recency order and the byte counter, so
//! an eviction pass always sees a consistent total. Rendering happens outside
//! the lock into a unique temporary file that is renamed into place.
//!
//! Eviction starts when either the byte budget or the entry capacity is
//! exceeded. A byte-triggered pass keeps removing least-recently-used entries
//! until the total is at or below 80% of the budget; a capacity-triggered pass
//! stops at the capacity.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{
    is_cache_stem, CacheKey, HandleSource, RenderOptions, ThumbnailGenerator, ThumbnailHandle,
    THUMBNAIL_EXTENSION,
};
use crate::db::{load_json, store_json, KeyValueStore};
use crate::models::{Asset, AssetId};

pub const CACHE_NAMESPACE: &str = "thumbnail_cache";
const METADATA_KEY: &str = "metadata";
const TEMP_EXTENSION: &str = "tmp";

pub const DEFAULT_MAX_BYTES: u64 = 500 * 1024 * 1024; // 500MB
pub const DEFAULT_CAPACITY: usize = 500;
pub const DEFAULT_PRELOAD_BATCH: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to render thumbnail for {asset}: {message}")]
    Render { asset: AssetId, message: String },

    #[error("Thumbnail for {asset} is {size} bytes, larger than the cache budget")]
    TooLarge { asset: AssetId, size: u64 },

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ThumbnailCacheSettings {
    pub dir: PathBuf,
    pub max_bytes: u64,
    pub capacity: usize,
    pub preload_batch_size: usize,
}

impl ThumbnailCacheSettings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_bytes: DEFAULT_MAX_BYTES,
            capacity: DEFAULT_CAPACITY,
            preload_batch_size: DEFAULT_PRELOAD_BATCH,
        }
    }
}

/// Record persisted under [`CACHE_NAMESPACE`]. Rebuilt from disk when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub entry_count: usize,
    pub total_size: u64,
    pub last_cleanup: Option<DateTime<Utc>>,
    pub max_size: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_size: u64,
    pub entry_count: usize,
    pub max_size: u64,
    pub capacity: usize,
}

/// Public view of one cached render.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryInfo {
    pub key: String,
    pub path: PathBuf,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CacheEntry {
    path: PathBuf,
    size: u64,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
    tick: u64,
    /// Prerendered previews belong to the host and are never deleted.
    owned: bool,
}

impl CacheEntry {
    fn handle(&self) -> ThumbnailHandle {
        ThumbnailHandle {
            path: self.path.clone(),
            source: if self.owned { HandleSource::Rendered } else { HandleSource::Prerendered },
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Access tick to stem; the first key is the least recently used entry.
    recency: BTreeMap<u64, String>,
    total_size: u64,
    max_bytes: u64,
    capacity: usize,
    next_tick: u64,
    last_cleanup: Option<DateTime<Utc>>,
}

impl CacheState {
    fn tick(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    fn touch(&mut self, stem: &str) -> Option<ThumbnailHandle> {
        let tick = self.tick();
        let entry = self.entries.get_mut(stem)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        entry.last_accessed_at = Utc::now();
        self.recency.insert(tick, stem.to_string());
        Some(entry.handle())
    }

    fn insert(&mut self, stem: String, mut entry: CacheEntry) -> ThumbnailHandle {
        entry.tick = self.tick();
        let handle = entry.handle();
        self.total_size += entry.size;
        self.recency.insert(entry.tick, stem.clone());
        self.entries.insert(stem, entry);
        handle
    }

    fn is_over_budget(&self) -> bool {
        self.total_size > self.max_bytes || self.entries.len() > self.capacity
    }

    /// Evict least-recently-used entries, never `protect`. Returns how many went.
    fn evict(&mut self, protect: Option<&str>) -> usize {
        if !self.is_over_budget() {
            return 0;
        }

        let target_bytes = if self.total_size > self.max_bytes {
            self.max_bytes / 5 * 4
        } else {
            self.max_bytes
        };

        let candidates: Vec<(u64, String)> = self
            .recency
            .iter()
            .map(|(tick, stem)| (*tick, stem.clone()))
            .collect();

        let mut evicted = 0;
        for (tick, stem) in candidates {
            if self.total_size <= target_bytes && self.entries.len() <= self.capacity {
                break;
            }
            if protect == Some(stem.as_str()) {
                continue;
            }

            self.recency.remove(&tick);
            if let Some(entry) = self.entries.remove(&stem) {
                self.total_size -= entry.size;
                if entry.owned {
                    if let Err(e) = fs::remove_file(&entry.path) {
                        warn!(path = %entry.path.display(), error = %e, "Failed to delete evicted thumbnail");
                    }
                }
                evicted += 1;
            }
        }

        self.last_cleanup = Some(Utc::now());
        debug!(evicted, total_size = self.total_size, entries = self.entries.len(), "Eviction pass");
        evicted
    }

    fn metadata(&self) -> CacheMetadata {
        CacheMetadata {
            entry_count: self.entries.len(),
            total_size: self.total_size,
            last_cleanup: self.last_cleanup,
            max_size: self.max_bytes,
        }
    }
}

pub struct ThumbnailCache {
    dir: PathBuf,
    preload_batch_size: usize,
    generator: Arc<dyn ThumbnailGenerator>,
    store: Option<Arc<dyn KeyValueStore>>,
    state: Mutex<CacheState>,
    temp_counter: AtomicU64,
}

impl ThumbnailCache {
    /// Open the cache directory, re-indexing whatever renders are already there.
    pub fn open(
        settings: ThumbnailCacheSettings,
        generator: Arc<dyn ThumbnailGenerator>,
        store: Option<Arc<dyn KeyValueStore>>,
    ) -> Result<Self, CacheError> {
        fs::create_dir_all(&settings.dir)?;

        let cache = Self {
            dir: settings.dir.clone(),
            preload_batch_size: settings.preload_batch_size.max(1),
            generator,
            store,
            state: Mutex::new(CacheState {
                max_bytes: settings.max_bytes,
                capacity: settings.capacity.max(1),
                ..CacheState::default()
            }),
            temp_counter: AtomicU64::new(0),
        };
        cache.rebuild_from_disk();
        Ok(cache)
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rebuild_from_disk(&self) {
        let mut found: Vec<(String, CacheEntry, std::time::SystemTime)> = Vec::new();

        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

            if extension == TEMP_EXTENSION {
                let _ = fs::remove_file(path);
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if extension != THUMBNAIL_EXTENSION || !is_cache_stem(stem) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };

            let modified = metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            let accessed = DateTime::<Utc>::from(modified);
            found.push((
                stem.to_string(),
                CacheEntry {
                    path: path.to_path_buf(),
                    size: metadata.len(),
                    created_at: accessed,
                    last_accessed_at: accessed,
                    tick: 0,
                    owned: true,
                },
                modified,
            ));
        }

        // Oldest file becomes the first eviction candidate.
        found.sort_by_key(|(_, _, modified)| *modified);

        let metadata = {
            let mut state = self.state();
            for (stem, entry, _) in found {
                state.insert(stem, entry);
            }
            state.evict(None);
            state.last_cleanup = Some(Utc::now());
            state.metadata()
        };

        if let Some(store) = &self.store {
            match load_json::<CacheMetadata>(store.as_ref(), CACHE_NAMESPACE, METADATA_KEY) {
                Ok(Some(saved))
                    if saved.entry_count == metadata.entry_count && saved.total_size == metadata.total_size => {}
                Ok(Some(saved)) => info!(
                    saved_entries = saved.entry_count,
                    saved_size = saved.total_size,
                    entries = metadata.entry_count,
                    size = metadata.total_size,
                    "Cache metadata out of date, rebuilt from directory scan"
                ),
                Ok(None) => debug!("No cache metadata stored yet"),
                Err(e) => warn!(error = %e, "Cache metadata unreadable, rebuilt from directory scan"),
            }
        }

        info!(
            dir = %self.dir.display(),
            entries = metadata.entry_count,
            size = metadata.total_size,
            "Thumbnail cache opened"
        );
        self.persist(&metadata);
    }

    fn persist(&self, metadata: &CacheMetadata) {
        if let Some(store) = &self.store {
            if let Err(e) = store_json(store.as_ref(), CACHE_NAMESPACE, METADATA_KEY, metadata) {
                warn!(error = %e, "Failed to persist cache metadata");
            }
        }
    }

    /// Thumbnail for `asset`. Falls back to the asset itself when rendering fails.
    pub fn get(&self, asset: &Asset, options: RenderOptions) -> ThumbnailHandle {
        match self.try_get(asset, options) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(asset = %asset.id, error = %e, "Thumbnail unavailable, using original");
                ThumbnailHandle {
                    path: asset.file_path.clone(),
                    source: HandleSource::Original,
                }
            }
        }
    }

    fn key(&self, asset_id: &str, options: RenderOptions) -> CacheKey {
        let mut key = CacheKey::new(asset_id, options);
        if !self.generator.uses_quality() {
            key.options.quality = 100;
        }
        key
    }

    pub fn try_get(&self, asset: &Asset, options: RenderOptions) -> Result<ThumbnailHandle, CacheError> {
        let key = self.key(&asset.id, options);
        let stem = key.file_stem();

        if let Some(handle) = self.state().touch(&stem) {
            return Ok(handle);
        }

        // (final path, size, temp file still to move into place)
        let (path, size, temp) = match prerendered(asset) {
            Some((path, size)) => (path, size, None),
            None => {
                let (temp, size) = self.render(asset, &key, &stem)?;
                let path = self.dir.join(format!("{}.{}", stem, THUMBNAIL_EXTENSION));
                (path, size, Some(temp))
            }
        };
        let discard = |temp: &Option<PathBuf>| {
            if let Some(temp) = temp {
                let _ = fs::remove_file(temp);
            }
        };

        let (handle, metadata) = {
            let mut state = self.state();

            // Another caller may have inserted the same key while we rendered.
            if let Some(handle) = state.touch(&stem) {
                discard(&temp);
                return Ok(handle);
            }
            if size > state.max_bytes {
                discard(&temp);
                return Err(CacheError::TooLarge {
                    asset: asset.id.clone(),
                    size,
                });
            }
            // Renamed under the lock so eviction never races the file into place.
            if let Some(temp_path) = &temp {
                if let Err(e) = fs::rename(temp_path, &path) {
                    discard(&temp);
                    return Err(e.into());
                }
            }

            let now = Utc::now();
            let handle = state.insert(
                stem.clone(),
                CacheEntry {
                    path,
                    size,
                    created_at: now,
                    last_accessed_at: now,
                    tick: 0,
                    owned: temp.is_some(),
                },
            );
            state.evict(Some(&stem));
            (handle, state.metadata())
        };

        self.persist(&metadata);
        Ok(handle)
    }

    /// Render into a fresh temporary file next to the final location.
    fn render(&self, asset: &Asset, key: &CacheKey, stem: &str) -> Result<(PathBuf, u64), CacheError> {
        let temp_path = self.dir.join(format!(
            "{}.{}.{}",
            stem,
            self.temp_counter.fetch_add(1, Ordering::SeqCst),
            TEMP_EXTENSION
        ));

        match self.generator.render(asset, &key.options, &temp_path) {
            Ok(size) => Ok((temp_path, size)),
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                Err(CacheError::Render {
                    asset: asset.id.clone(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Warm the cache. Runs `preload_batch_size` renders at a time; failures are logged only.
    pub fn preload(&self, assets: &[Asset], options: RenderOptions) {
        for batch in assets.chunks(self.preload_batch_size) {
            batch.par_iter().for_each(|asset| {
                if let Err(e) = self.try_get(asset, options) {
                    warn!(asset = %asset.id, error = %e, "Preload failed");
                }
            });
        }
    }

    pub fn clear(&self) {
        let metadata = {
            let mut state = self.state();
            for entry in state.entries.values().filter(|entry| entry.owned) {
                if let Err(e) = fs::remove_file(&entry.path) {
                    warn!(path = %entry.path.display(), error = %e, "Failed to delete thumbnail");
                }
            }
            state.entries.clear();
            state.recency.clear();
            state.total_size = 0;
            state.last_cleanup = Some(Utc::now());
            state.metadata()
        };

        info!("Thumbnail cache cleared");
        self.persist(&metadata);
    }

    /// Change the byte budget, evicting right away if the cache no longer fits.
    pub fn resize(&self, max_bytes: u64) {
        let metadata = {
            let mut state = self.state();
            state.max_bytes = max_bytes;
            state.evict(None);
            state.metadata()
        };

        info!(max_bytes, size = metadata.total_size, "Thumbnail cache budget changed");
        self.persist(&metadata);
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state();
        CacheStats {
            total_size: state.total_size,
            entry_count: state.entries.len(),
            max_size: state.max_bytes,
            capacity: state.capacity,
        }
    }

    /// Entries from least to most recently used.
    pub fn entries(&self) -> Vec<CacheEntryInfo> {
        let state = self.state();
        state
            .recency
            .values()
            .filter_map(|stem| state.entries.get(stem).map(|entry| (stem, entry)))
            .map(|(stem, entry)| CacheEntryInfo {
                key: stem.clone(),
                path: entry.path.clone(),
                size: entry.size,
                created_at: entry.created_at,
                last_accessed_at: entry.last_accessed_at,
            })
            .collect()
    }

    /// Whether a render for this key is cached. Does not count as an access.
    pub fn contains(&self, asset_id: &str, options: RenderOptions) -> bool {
        let stem = self.key(asset_id, options).file_stem();
        self.state().entries.contains_key(&stem)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn prerendered(asset: &Asset) -> Option<(PathBuf, u64)> {
    let path = asset.thumbnail_path.as_ref()?;
    let size = fs::metadata(path).ok()?.len();
    Some((path.clone(), size))
}
