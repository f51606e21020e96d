//! Batch Operation Engine.
//!
//! Requests run one at a time in submission order. A failing request is
//! recorded in its own result and the loop moves on; nothing is retried here.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{OrganizeError, Result};
use crate::index::AssetIndexAdapter;
use crate::models::{
    Album, Asset, AssetId, BatchReport, OperationKind, OperationRequest, OperationResult,
};
use crate::task_manager::{TaskInfo, TaskManager};
use crate::undo::{ReversibleAction, UndoRegistry, UndoToken};

/// What a successful operation leaves behind.
struct Applied {
    reversible: Option<ReversibleAction>,
    new_asset_id: Option<AssetId>,
}

impl Applied {
    fn irreversible() -> Self {
        Self {
            reversible: None,
            new_asset_id: None,
        }
    }
}

pub struct BatchEngine {
    adapter: Arc<AssetIndexAdapter>,
    registry: Arc<UndoRegistry>,
    tasks: TaskManager,
}

impl BatchEngine {
    pub fn new(adapter: Arc<AssetIndexAdapter>, registry: Arc<UndoRegistry>) -> Self {
        Self {
            adapter,
            registry,
            tasks: TaskManager::new(),
        }
    }

    /// Run `requests` in order. Only fails as a whole with `EngineBusy`.
    pub fn submit(&self, requests: &[OperationRequest]) -> Result<BatchReport> {
        let guard = self.tasks.try_start(requests.len())?;
        let batch_id = guard.task().get_info().batch_id;
        info!(batch_id, total = requests.len(), "Starting batch");

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = match self.apply(request) {
                Ok(applied) => {
                    let token = applied.reversible.map(|action| self.registry.register(action));
                    OperationResult::succeeded(request.clone(), token, applied.new_asset_id)
                }
                Err(err) => {
                    warn!(
                        batch_id,
                        asset = %request.asset_id,
                        kind = ?request.kind,
                        error = %err,
                        "Operation failed"
                    );
                    OperationResult::failed(request.clone(), &err)
                }
            };
            guard.task().record(result.success);
            results.push(result);
        }

        let report = BatchReport::from_results(results);
        info!(
            batch_id,
            succeeded = report.succeeded,
            failed = report.failed,
            "Batch finished"
        );
        Ok(report)
    }

    /// Revert a registered action. Holds the batch slot while the host is
    /// mutated, so it fails with `EngineBusy` and keeps the token while a
    /// batch runs.
    pub fn undo(&self, token: UndoToken) -> Result<()> {
        let guard = self.tasks.try_start(1)?;
        let reverted = self.registry.invoke(token, &self.adapter);
        guard.task().record(reverted.is_ok());
        reverted
    }

    pub fn progress(&self) -> Option<TaskInfo> {
        self.tasks.current()
    }

    pub fn is_busy(&self) -> bool {
        self.tasks.has_running_task()
    }

    fn apply(&self, request: &OperationRequest) -> Result<Applied> {
        match request.kind {
            OperationKind::Move => self.apply_move(request),
            OperationKind::Copy => self.apply_copy(request),
            OperationKind::Delete => self.apply_delete(request),
        }
    }

    fn resolve_target(&self, request: &OperationRequest) -> Result<Album> {
        let album_id = request
            .target_album
            .as_deref()
            .ok_or_else(|| OrganizeError::AlbumNotFound(String::new()))?;
        let album = self.adapter.resolve_album(album_id)?;
        self.adapter.ensure_available(&album)?;
        Ok(album)
    }

    fn apply_move(&self, request: &OperationRequest) -> Result<Applied> {
        let asset = self.adapter.resolve_asset(&request.asset_id)?;
        let target = self.resolve_target(request)?;
        require_writable(&target)?;

        if asset.album_id.as_deref() == Some(target.id.as_str()) {
            debug!(asset = %asset.id, album = %target.id, "Asset already in target album");
            return Ok(Applied::irreversible());
        }

        let source = match asset.album_id.as_deref() {
            Some(id) => {
                let album = self.adapter.resolve_album(id)?;
                require_writable(&album)?;
                self.adapter.ensure_available(&album)?;
                Some(album)
            }
            None => None,
        };

        self.adapter.add_to_album(&asset, &target)?;
        if let Some(source) = &source {
            if let Err(err) = self.adapter.remove_from_album(&asset, source) {
                self.roll_back_add(&asset, source, &target);
                return Err(OrganizeError::AdapterFailure(format!(
                    "could not remove {} from {}: {}",
                    asset.id, source.id, err
                )));
            }
        }

        Ok(Applied {
            reversible: Some(ReversibleAction::Move {
                asset_id: asset.id.clone(),
                from: source.map(|album| album.id),
                to: target.id,
            }),
            new_asset_id: None,
        })
    }

    /// Put the asset back in `source` after the add to `target` went through,
    /// then drop any `target` membership a multi-album host still holds.
    fn roll_back_add(&self, asset: &Asset, source: &Album, target: &Album) {
        let restored = self
            .adapter
            .add_to_album(asset, source)
            .and_then(|()| self.adapter.remove_from_album(asset, target));
        if let Err(err) = restored {
            warn!(
                asset = %asset.id,
                source = %source.id,
                target = %target.id,
                error = %err,
                "Rollback of partial move failed"
            );
        }
    }

    fn apply_copy(&self, request: &OperationRequest) -> Result<Applied> {
        let asset = self.adapter.resolve_asset(&request.asset_id)?;
        let target = self.resolve_target(request)?;
        require_writable(&target)?;

        let available = self.adapter.free_storage_bytes()?;
        if available < asset.file_size {
            return Err(OrganizeError::InsufficientStorage {
                required: asset.file_size,
                available,
            });
        }

        let duplicate_id = self.adapter.duplicate_into(&asset, &target)?;
        Ok(Applied {
            reversible: Some(ReversibleAction::Copy {
                duplicate_id: duplicate_id.clone(),
            }),
            new_asset_id: Some(duplicate_id),
        })
    }

    fn apply_delete(&self, request: &OperationRequest) -> Result<Applied> {
        if request.confirmation.is_none() {
            return Err(OrganizeError::UserCancelled);
        }

        let asset = self.adapter.resolve_asset(&request.asset_id)?;
        if let Some(album_id) = asset.album_id.as_deref() {
            let album = self.adapter.resolve_album(album_id)?;
            if !album.capabilities.can_delete {
                return Err(OrganizeError::PermissionDenied(format!(
                    "album '{}' does not allow deletion",
                    album.title
                )));
            }
            self.adapter.ensure_available(&album)?;
        }

        let outcome = self.adapter.delete(&asset)?;
        let reversible = outcome.recoverable.then(|| ReversibleAction::Delete {
            asset_id: asset.id.clone(),
        });
        Ok(Applied {
            reversible,
            new_asset_id: None,
        })
    }
}

fn require_writable(album: &Album) -> Result<()> {
    if album.capabilities.can_write {
        Ok(())
    } else {
        Err(OrganizeError::PermissionDenied(format!(
            "album '{}' is read-only",
            album.title
        )))
    }
}
