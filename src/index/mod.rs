//! Boundary to the platform's media index.
//!
//! [`HostMediaIndex`] is what the platform provides. The engine never talks to
//! it directly; every call goes through [`AssetIndexAdapter`], which turns
//! `None` lookups and [`IndexError`]s into typed engine errors.

pub mod adapter;
pub mod memory;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{Album, Asset, AssetId};

pub use adapter::AssetIndexAdapter;
pub use memory::InMemoryMediaIndex;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndexError {
    #[error("Album already exists: {0}")]
    AlbumExists(String),

    #[error("Volume is not mounted: {0}")]
    VolumeUnavailable(String),

    #[error("{0}")]
    Host(String),
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Result of a host delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// The asset went to a trash it can be restored from.
    pub recoverable: bool,
}

/// Platform media index. Every call may block; each one is atomic from the
/// engine's point of view.
pub trait HostMediaIndex: Send + Sync {
    fn resolve_asset(&self, id: &str) -> IndexResult<Option<Asset>>;

    fn resolve_album(&self, id: &str) -> IndexResult<Option<Album>>;

    fn list_albums(&self) -> IndexResult<Vec<Album>>;

    /// `duplicate = true` copies the asset and returns the new identity.
    fn add_asset_to_album(&self, asset: &Asset, album: &Album, duplicate: bool) -> IndexResult<Option<AssetId>>;

    fn remove_asset_from_album(&self, asset: &Asset, album: &Album) -> IndexResult<()>;

    fn delete_asset(&self, asset: &Asset) -> IndexResult<DeleteOutcome>;

    /// Bring a trashed asset back.
    fn restore_asset(&self, id: &str) -> IndexResult<()>;

    fn create_album(&self, name: &str) -> IndexResult<Album>;

    fn query_free_storage_bytes(&self) -> IndexResult<u64>;

    fn is_volume_mounted(&self, volume: &Path) -> bool;

    /// Tell other consumers of the index to re-scan.
    fn notify_index_changed(&self);
}
