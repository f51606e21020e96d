//! Reversible actions produced by successful batch operations.
//!
//! Each action stores only what it needs to invert itself. The registry maps
//! tokens to actions for a bounded window; a token is consumed by its first
//! invocation whether or not the revert succeeds.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OrganizeError, Result};
use crate::index::AssetIndexAdapter;
use crate::models::{AlbumId, AssetId, OperationKind};

pub const DEFAULT_UNDO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UndoToken(pub(crate) u64);

impl fmt::Display for UndoToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReversibleAction {
    /// Put the asset back where it was. `from` is `None` when it had no album.
    Move {
        asset_id: AssetId,
        from: Option<AlbumId>,
        to: AlbumId,
    },
    /// Delete the duplicate a copy created.
    Copy { duplicate_id: AssetId },
    /// Restore an asset the host moved to its trash.
    Delete { asset_id: AssetId },
}

impl ReversibleAction {
    pub fn kind(&self) -> OperationKind {
        match self {
            ReversibleAction::Move { .. } => OperationKind::Move,
            ReversibleAction::Copy { .. } => OperationKind::Copy,
            ReversibleAction::Delete { .. } => OperationKind::Delete,
        }
    }

    pub fn revert(&self, adapter: &AssetIndexAdapter) -> Result<()> {
        match self {
            ReversibleAction::Move { asset_id, from, to } => {
                let asset = adapter.resolve_asset(asset_id)?;
                if asset.album_id.as_deref() != Some(to.as_str()) {
                    return Err(OrganizeError::AdapterFailure(format!(
                        "{} is no longer in {}",
                        asset_id, to
                    )));
                }
                let moved_to = adapter.resolve_album(to)?;
                match from {
                    Some(from) => {
                        let original = adapter.resolve_album(from)?;
                        adapter.add_to_album(&asset, &original)?;
                        adapter.remove_from_album(&asset, &moved_to)
                    }
                    None => adapter.remove_from_album(&asset, &moved_to),
                }
            }
            ReversibleAction::Copy { duplicate_id } => {
                let duplicate = adapter.resolve_asset(duplicate_id)?;
                adapter.delete(&duplicate).map(|_| ())
            }
            ReversibleAction::Delete { asset_id } => adapter.restore(asset_id),
        }
    }
}

struct UndoEntry {
    action: ReversibleAction,
    registered_at: Instant,
}

pub struct UndoRegistry {
    entries: Mutex<HashMap<UndoToken, UndoEntry>>,
    next_token: AtomicU64,
    timeout: Duration,
}

impl Default for UndoRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_TIMEOUT)
    }
}

impl UndoRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            timeout,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<UndoToken, UndoEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn register(&self, action: ReversibleAction) -> UndoToken {
        let token = UndoToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        debug!(%token, kind = ?action.kind(), "Registered reversible action");
        self.entries().insert(
            token,
            UndoEntry {
                action,
                registered_at: Instant::now(),
            },
        );
        token
    }

    /// Take the action out of the registry. Fails once the window has passed
    /// or when the token was already taken.
    pub fn take(&self, token: UndoToken) -> Result<ReversibleAction> {
        let entry = self.entries().remove(&token).ok_or(OrganizeError::Expired(token))?;
        if entry.registered_at.elapsed() >= self.timeout {
            return Err(OrganizeError::Expired(token));
        }
        Ok(entry.action)
    }

    pub fn invoke(&self, token: UndoToken, adapter: &AssetIndexAdapter) -> Result<()> {
        let action = self.take(token)?;
        action.revert(adapter)?;
        info!(%token, kind = ?action.kind(), "Reverted operation");
        Ok(())
    }

    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.registered_at.elapsed() < self.timeout);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
