use serde::{Deserialize, Serialize};

use crate::models::{AlbumId, AssetId};
use crate::undo::UndoToken;

/// Flat classification of every failure the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    AssetNotFound,
    AlbumNotFound,
    AlbumAlreadyExists,
    InsufficientStorage,
    UserCancelled,
    RemovableMediaUnavailable,
    PermissionDenied,
    AdapterFailure,
    Expired,
    EngineBusy,
}

impl ErrorKind {
    /// Non-recoverable kinds need a corrective action from the user, not a retry.
    pub fn is_recoverable(self) -> bool {
        !matches!(
            self,
            ErrorKind::InsufficientStorage | ErrorKind::RemovableMediaUnavailable
        )
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrganizeError {
    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    #[error("Album not found: {0}")]
    AlbumNotFound(AlbumId),

    #[error("An album named '{0}' already exists")]
    AlbumAlreadyExists(String),

    #[error("Not enough free storage: {required} bytes required, {available} available")]
    InsufficientStorage { required: u64, available: u64 },

    #[error("Operation was not confirmed by the user")]
    UserCancelled,

    #[error("Removable media for album '{album}' is not mounted")]
    RemovableMediaUnavailable { album: AlbumId },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Host media index failure: {0}")]
    AdapterFailure(String),

    #[error("Undo token {0} has expired or was already used")]
    Expired(UndoToken),

    #[error("Another batch is already in progress")]
    EngineBusy,
}

impl OrganizeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrganizeError::AssetNotFound(_) => ErrorKind::AssetNotFound,
            OrganizeError::AlbumNotFound(_) => ErrorKind::AlbumNotFound,
            OrganizeError::AlbumAlreadyExists(_) => ErrorKind::AlbumAlreadyExists,
            OrganizeError::InsufficientStorage { .. } => ErrorKind::InsufficientStorage,
            OrganizeError::UserCancelled => ErrorKind::UserCancelled,
            OrganizeError::RemovableMediaUnavailable { .. } => ErrorKind::RemovableMediaUnavailable,
            OrganizeError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            OrganizeError::AdapterFailure(_) => ErrorKind::AdapterFailure,
            OrganizeError::Expired(_) => ErrorKind::Expired,
            OrganizeError::EngineBusy => ErrorKind::EngineBusy,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }
}

pub type Result<T> = std::result::Result<T, OrganizeError>;
