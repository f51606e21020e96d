use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::media::AlbumId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: AlbumId,
    pub title: String,
    pub item_count: u64,
    pub kind: AlbumKind,
    pub location: StorageLocation,
    pub capabilities: AlbumCapabilities,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AlbumKind {
    User,
    SystemManaged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum StorageLocation {
    Internal,
    Removable { volume: PathBuf },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlbumCapabilities {
    pub can_read: bool,
    pub can_write: bool,
    pub can_delete: bool,
    /// Set by the host index for the album new captures land in.
    pub is_default: bool,
}

impl AlbumCapabilities {
    pub fn full() -> Self {
        Self {
            can_read: true,
            can_write: true,
            can_delete: true,
            is_default: false,
        }
    }

    pub fn read_only() -> Self {
        Self {
            can_read: true,
            can_write: false,
            can_delete: false,
            is_default: false,
        }
    }
}

impl Album {
    pub fn user(id: impl Into<AlbumId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            item_count: 0,
            kind: AlbumKind::User,
            location: StorageLocation::Internal,
            capabilities: AlbumCapabilities::full(),
        }
    }

    pub fn system(id: impl Into<AlbumId>, title: impl Into<String>) -> Self {
        Self {
            kind: AlbumKind::SystemManaged,
            capabilities: AlbumCapabilities::read_only(),
            ..Self::user(id, title)
        }
    }

    pub fn on_volume(mut self, volume: impl Into<PathBuf>) -> Self {
        self.location = StorageLocation::Removable { volume: volume.into() };
        self
    }

    pub fn as_default(mut self) -> Self {
        self.capabilities.is_default = true;
        self
    }

    pub fn with_capabilities(mut self, capabilities: AlbumCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn removable_volume(&self) -> Option<&PathBuf> {
        match &self.location {
            StorageLocation::Removable { volume } => Some(volume),
            StorageLocation::Internal => None,
        }
    }
}
