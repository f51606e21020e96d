#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pengler_organizer::db::{Database, KeyValueStore};
use pengler_organizer::thumbnail::{RenderOptions, ThumbnailCacheSettings, ThumbnailGenerator};
use pengler_organizer::{
    Album, AllowAll, Asset, Config, HostMediaIndex, InMemoryMediaIndex, MediaType, Organizer,
};
use tempfile::TempDir;

pub const GB: u64 = 1024 * 1024 * 1024;

/// Writes `size` zero bytes per render and records concurrency.
pub struct FakeGenerator {
    size: u64,
    delay: Duration,
    failing: Mutex<HashSet<String>>,
    renders: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGenerator {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            delay: Duration::ZERO,
            failing: Mutex::new(HashSet::new()),
            renders: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_for(&self, asset_id: &str) {
        self.failing.lock().unwrap().insert(asset_id.to_string());
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ThumbnailGenerator for FakeGenerator {
    fn render(&self, asset: &Asset, _options: &RenderOptions, dest: &Path) -> anyhow::Result<u64> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let result = if self.failing.lock().unwrap().contains(&asset.id) {
            Err(anyhow::anyhow!("corrupt image data"))
        } else {
            fs::write(dest, vec![0u8; self.size as usize])
                .map(|_| self.size)
                .map_err(anyhow::Error::from)
        };

        self.renders.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn photo(id: &str, album: &str) -> Asset {
    Asset::new(id, format!("/dcim/{}.jpg", id), MediaType::Photo, 4 * 1024 * 1024).in_album(album)
}

pub fn unsorted_photo(id: &str) -> Asset {
    Asset::new(id, format!("/dcim/{}.jpg", id), MediaType::Photo, 1024)
}

/// Index with:
/// - camera (default), albumX, albumY: writable user albums
/// - favorites: system-managed, read-only
/// - sdcard: on removable volume /media/sd, mounted
/// - photoA, photoB, photoD in camera; photoC (2 GB) in camera
pub fn library() -> Arc<InMemoryMediaIndex> {
    let index = Arc::new(InMemoryMediaIndex::new());
    index.insert_album(Album::user("camera", "All Photos").as_default());
    index.insert_album(Album::user("albumX", "Trips"));
    index.insert_album(Album::user("albumY", "Family"));
    index.insert_album(Album::system("favorites", "Favorites"));
    index.insert_album(Album::user("sdcard", "SD Card").on_volume("/media/sd"));

    index.insert_asset(photo("photoA", "camera"));
    index.insert_asset(photo("photoB", "camera"));
    index.insert_asset(photo("photoD", "camera"));

    let mut big = photo("photoC", "camera");
    big.file_size = 2 * GB;
    index.insert_asset(big);

    index
}

pub fn test_config(dir: &TempDir) -> Config {
    Config {
        cache_folder: dir.path().to_string_lossy().to_string(),
        ..Config::default()
    }
}

pub fn organizer_with(config: Config, index: Arc<dyn HostMediaIndex>) -> Organizer {
    let store: Arc<dyn KeyValueStore> = Arc::new(Database::open_in_memory().unwrap());
    Organizer::with_parts(
        config,
        index,
        Arc::new(FakeGenerator::new(100)),
        Some(store),
        Arc::new(AllowAll),
    )
    .unwrap()
}

pub fn organizer(dir: &TempDir, index: Arc<InMemoryMediaIndex>) -> Organizer {
    organizer_with(test_config(dir), index)
}

pub fn cache_settings(dir: &Path, max_bytes: u64, capacity: usize) -> ThumbnailCacheSettings {
    ThumbnailCacheSettings {
        max_bytes,
        capacity,
        ..ThumbnailCacheSettings::new(dir)
    }
}

pub fn grid_options() -> RenderOptions {
    RenderOptions::square(256, 80)
}
