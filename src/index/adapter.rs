use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use super::{DeleteOutcome, HostMediaIndex, IndexError};
use crate::error::{OrganizeError, Result};
use crate::models::{Album, AlbumId, Asset, AssetId};

impl From<IndexError> for OrganizeError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::AlbumExists(name) => OrganizeError::AlbumAlreadyExists(name),
            IndexError::VolumeUnavailable(album) => OrganizeError::RemovableMediaUnavailable { album },
            IndexError::Host(message) => OrganizeError::AdapterFailure(message),
        }
    }
}

struct Cached<T> {
    value: T,
    fetched_at: Instant,
}

/// Typed front of the host index.
///
/// Lookups are cached for a short TTL so a batch touching the same album many
/// times resolves it once. Any mutation drops the entries it may have made stale.
pub struct AssetIndexAdapter {
    index: Arc<dyn HostMediaIndex>,
    ttl: Duration,
    assets: Mutex<HashMap<AssetId, Cached<Asset>>>,
    albums: Mutex<HashMap<AlbumId, Cached<Album>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn cached<T: Clone>(map: &Mutex<HashMap<String, Cached<T>>>, id: &str, ttl: Duration) -> Option<T> {
    let map = lock(map);
    map.get(id)
        .filter(|entry| entry.fetched_at.elapsed() < ttl)
        .map(|entry| entry.value.clone())
}

fn remember<T>(map: &Mutex<HashMap<String, Cached<T>>>, id: &str, value: T) {
    lock(map).insert(
        id.to_string(),
        Cached {
            value,
            fetched_at: Instant::now(),
        },
    );
}

impl AssetIndexAdapter {
    pub fn new(index: Arc<dyn HostMediaIndex>, ttl: Duration) -> Self {
        Self {
            index,
            ttl,
            assets: Mutex::new(HashMap::new()),
            albums: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolve_asset(&self, id: &str) -> Result<Asset> {
        if let Some(asset) = cached(&self.assets, id, self.ttl) {
            return Ok(asset);
        }

        let asset = self
            .index
            .resolve_asset(id)?
            .ok_or_else(|| OrganizeError::AssetNotFound(id.to_string()))?;
        remember(&self.assets, id, asset.clone());
        Ok(asset)
    }

    pub fn resolve_album(&self, id: &str) -> Result<Album> {
        if let Some(album) = cached(&self.albums, id, self.ttl) {
            return Ok(album);
        }

        let album = self
            .index
            .resolve_album(id)?
            .ok_or_else(|| OrganizeError::AlbumNotFound(id.to_string()))?;
        remember(&self.albums, id, album.clone());
        Ok(album)
    }

    /// Album flagged as default by the host, if any.
    pub fn default_album(&self) -> Result<Option<Album>> {
        let albums = self.index.list_albums()?;
        Ok(albums.into_iter().find(|album| album.capabilities.is_default))
    }

    /// Fails when the album lives on a removable volume that is not mounted.
    pub fn ensure_available(&self, album: &Album) -> Result<()> {
        match album.removable_volume() {
            Some(volume) if !self.index.is_volume_mounted(volume) => {
                Err(OrganizeError::RemovableMediaUnavailable { album: album.id.clone() })
            }
            _ => Ok(()),
        }
    }

    pub fn add_to_album(&self, asset: &Asset, album: &Album) -> Result<()> {
        self.index.add_asset_to_album(asset, album, false)?;
        self.invalidate(&asset.id, &[album.id.as_str()]);
        Ok(())
    }

    /// Copy `asset` into `album`, returning the duplicate's identity.
    pub fn duplicate_into(&self, asset: &Asset, album: &Album) -> Result<AssetId> {
        let new_id = self.index.add_asset_to_album(asset, album, true)?;
        self.invalidate(&asset.id, &[album.id.as_str()]);
        new_id.ok_or_else(|| {
            OrganizeError::AdapterFailure(format!(
                "host did not report a duplicate for {} in {}",
                asset.id, album.id
            ))
        })
    }

    pub fn remove_from_album(&self, asset: &Asset, album: &Album) -> Result<()> {
        self.index.remove_asset_from_album(asset, album)?;
        self.invalidate(&asset.id, &[album.id.as_str()]);
        Ok(())
    }

    pub fn delete(&self, asset: &Asset) -> Result<DeleteOutcome> {
        let outcome = self.index.delete_asset(asset)?;
        let album_ids: Vec<&str> = asset.album_id.as_deref().into_iter().collect();
        self.invalidate(&asset.id, &album_ids);
        debug!(asset = %asset.id, recoverable = outcome.recoverable, "Asset deleted from host index");
        Ok(outcome)
    }

    pub fn restore(&self, asset_id: &str) -> Result<()> {
        self.index.restore_asset(asset_id)?;
        self.invalidate(asset_id, &[]);
        lock(&self.albums).clear();
        Ok(())
    }

    pub fn create_album(&self, name: &str) -> Result<Album> {
        let wanted = name.trim();
        let exists = self
            .index
            .list_albums()?
            .iter()
            .any(|album| album.title.trim().eq_ignore_ascii_case(wanted));
        if exists {
            return Err(OrganizeError::AlbumAlreadyExists(wanted.to_string()));
        }

        let album = self.index.create_album(wanted)?;
        remember(&self.albums, &album.id, album.clone());
        Ok(album)
    }

    pub fn free_storage_bytes(&self) -> Result<u64> {
        Ok(self.index.query_free_storage_bytes()?)
    }

    pub fn notify_index_changed(&self) {
        lock(&self.assets).clear();
        lock(&self.albums).clear();
        self.index.notify_index_changed();
    }

    fn invalidate(&self, asset_id: &str, album_ids: &[&str]) {
        lock(&self.assets).remove(asset_id);
        let mut albums = lock(&self.albums);
        for id in album_ids {
            albums.remove(*id);
        }
    }
}
