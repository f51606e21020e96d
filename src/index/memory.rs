use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use super::{DeleteOutcome, HostMediaIndex, IndexError, IndexResult};
use crate::models::{Album, Asset, AssetId};

/// Membership lives only on `Asset::album_id`; album item counts are derived from it.
#[derive(Default)]
struct IndexState {
    assets: HashMap<AssetId, Asset>,
    albums: HashMap<String, Album>,
    trash: HashMap<AssetId, Asset>,
    mounted_volumes: HashSet<PathBuf>,
    free_bytes: u64,
    use_trash: bool,
}

impl IndexState {
    fn member_count(&self, album_id: &str) -> u64 {
        self.assets
            .values()
            .filter(|asset| asset.album_id.as_deref() == Some(album_id))
            .count() as u64
    }

    fn album(&self, id: &str) -> Option<Album> {
        let mut album = self.albums.get(id)?.clone();
        album.item_count = self.member_count(id);
        Some(album)
    }
}

/// Host media index kept entirely in memory.
///
/// Used to embed the engine where no platform index exists and as the
/// reference collaborator in tests.
pub struct InMemoryMediaIndex {
    state: RwLock<IndexState>,
    next_id: AtomicU64,
    changes: AtomicU64,
}

impl Default for InMemoryMediaIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMediaIndex {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IndexState {
                free_bytes: u64::MAX,
                use_trash: true,
                ..IndexState::default()
            }),
            next_id: AtomicU64::new(1),
            changes: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_album(&self, album: Album) {
        if let Some(volume) = album.removable_volume() {
            self.write().mounted_volumes.insert(volume.clone());
        }
        self.write().albums.insert(album.id.clone(), album);
    }

    pub fn insert_asset(&self, asset: Asset) {
        self.write().assets.insert(asset.id.clone(), asset);
    }

    pub fn set_free_storage(&self, bytes: u64) {
        self.write().free_bytes = bytes;
    }

    pub fn set_volume_mounted(&self, volume: impl Into<PathBuf>, mounted: bool) {
        let volume = volume.into();
        let mut state = self.write();
        if mounted {
            state.mounted_volumes.insert(volume);
        } else {
            state.mounted_volumes.remove(&volume);
        }
    }

    /// When disabled, deletes are permanent and report `recoverable = false`.
    pub fn set_trash_enabled(&self, enabled: bool) {
        self.write().use_trash = enabled;
    }

    pub fn asset(&self, id: &str) -> Option<Asset> {
        self.read().assets.get(id).cloned()
    }

    pub fn album(&self, id: &str) -> Option<Album> {
        self.read().album(id)
    }

    pub fn is_trashed(&self, id: &str) -> bool {
        self.read().trash.contains_key(id)
    }

    pub fn asset_count(&self) -> usize {
        self.read().assets.len()
    }

    /// Number of `notify_index_changed` calls seen so far.
    pub fn change_count(&self) -> u64 {
        self.changes.load(Ordering::SeqCst)
    }

    fn mint_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl HostMediaIndex for InMemoryMediaIndex {
    fn resolve_asset(&self, id: &str) -> IndexResult<Option<Asset>> {
        Ok(self.read().assets.get(id).cloned())
    }

    fn resolve_album(&self, id: &str) -> IndexResult<Option<Album>> {
        Ok(self.read().album(id))
    }

    fn list_albums(&self) -> IndexResult<Vec<Album>> {
        let state = self.read();
        let mut albums: Vec<Album> = state.albums.keys().filter_map(|id| state.album(id)).collect();
        albums.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(albums)
    }

    fn add_asset_to_album(&self, asset: &Asset, album: &Album, duplicate: bool) -> IndexResult<Option<AssetId>> {
        let new_id = duplicate.then(|| self.mint_id(&asset.id));
        let mut state = self.write();

        if let Some(volume) = album.removable_volume() {
            if !state.mounted_volumes.contains(volume) {
                return Err(IndexError::VolumeUnavailable(album.id.clone()));
            }
        }
        if !state.albums.contains_key(&album.id) {
            return Err(IndexError::Host(format!("unknown album {}", album.id)));
        }
        let stored = state
            .assets
            .get(&asset.id)
            .cloned()
            .ok_or_else(|| IndexError::Host(format!("unknown asset {}", asset.id)))?;

        match &new_id {
            Some(id) => {
                if state.free_bytes < stored.file_size {
                    return Err(IndexError::Host("storage full".to_string()));
                }
                state.free_bytes -= stored.file_size;

                let mut copy = stored;
                copy.id = id.clone();
                copy.album_id = Some(album.id.clone());
                copy.created_at = Utc::now();
                copy.modified_at = copy.created_at;
                state.assets.insert(id.clone(), copy);
            }
            None => {
                if let Some(entry) = state.assets.get_mut(&asset.id) {
                    entry.album_id = Some(album.id.clone());
                }
            }
        }

        Ok(new_id)
    }

    fn remove_asset_from_album(&self, asset: &Asset, album: &Album) -> IndexResult<()> {
        let mut state = self.write();
        let entry = state
            .assets
            .get_mut(&asset.id)
            .ok_or_else(|| IndexError::Host(format!("unknown asset {}", asset.id)))?;

        // Only clear the reference if the asset did not already move on.
        if entry.album_id.as_deref() == Some(album.id.as_str()) {
            entry.album_id = None;
        }
        Ok(())
    }

    fn delete_asset(&self, asset: &Asset) -> IndexResult<DeleteOutcome> {
        let mut state = self.write();
        let removed = state
            .assets
            .remove(&asset.id)
            .ok_or_else(|| IndexError::Host(format!("unknown asset {}", asset.id)))?;

        let recoverable = state.use_trash;
        if recoverable {
            state.trash.insert(removed.id.clone(), removed);
        } else {
            state.free_bytes = state.free_bytes.saturating_add(removed.file_size);
        }
        Ok(DeleteOutcome { recoverable })
    }

    fn restore_asset(&self, id: &str) -> IndexResult<()> {
        let mut state = self.write();
        let asset = state
            .trash
            .remove(id)
            .ok_or_else(|| IndexError::Host(format!("asset {} is not in the trash", id)))?;
        state.assets.insert(asset.id.clone(), asset);
        Ok(())
    }

    fn create_album(&self, name: &str) -> IndexResult<Album> {
        let mut state = self.write();
        if state.albums.values().any(|album| album.title == name) {
            return Err(IndexError::AlbumExists(name.to_string()));
        }

        let album = Album::user(self.mint_id("album"), name);
        state.albums.insert(album.id.clone(), album.clone());
        Ok(album)
    }

    fn query_free_storage_bytes(&self) -> IndexResult<u64> {
        Ok(self.read().free_bytes)
    }

    fn is_volume_mounted(&self, volume: &Path) -> bool {
        self.read().mounted_volumes.contains(volume)
    }

    fn notify_index_changed(&self) {
        self.changes.fetch_add(1, Ordering::SeqCst);
    }
}
