use serde::{Deserialize, Serialize};

use super::media::{AlbumId, AssetId};
use crate::error::{ErrorKind, OrganizeError};
use crate::undo::UndoToken;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Move,
    Copy,
    Delete,
}

/// Proof that the user confirmed a destructive request. The UI obtains it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Confirmation;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub kind: OperationKind,
    pub asset_id: AssetId,
    pub target_album: Option<AlbumId>,
    #[serde(default)]
    pub confirmation: Option<Confirmation>,
}

impl OperationRequest {
    pub fn move_to(asset_id: impl Into<AssetId>, album_id: impl Into<AlbumId>) -> Self {
        Self {
            kind: OperationKind::Move,
            asset_id: asset_id.into(),
            target_album: Some(album_id.into()),
            confirmation: None,
        }
    }

    pub fn copy_to(asset_id: impl Into<AssetId>, album_id: impl Into<AlbumId>) -> Self {
        Self {
            kind: OperationKind::Copy,
            ..Self::move_to(asset_id, album_id)
        }
    }

    pub fn delete(asset_id: impl Into<AssetId>, confirmed: bool) -> Self {
        Self {
            kind: OperationKind::Delete,
            asset_id: asset_id.into(),
            target_album: None,
            confirmation: confirmed.then_some(Confirmation),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationError {
    pub kind: ErrorKind,
    pub hint: String,
    pub recoverable: bool,
}

impl From<&OrganizeError> for OperationError {
    fn from(err: &OrganizeError) -> Self {
        Self {
            kind: err.kind(),
            hint: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    pub request: OperationRequest,
    pub error: Option<OperationError>,
    pub undo_token: Option<UndoToken>,
    /// Identity of the duplicate a successful copy created.
    pub new_asset_id: Option<AssetId>,
}

impl OperationResult {
    pub fn succeeded(request: OperationRequest, undo_token: Option<UndoToken>, new_asset_id: Option<AssetId>) -> Self {
        Self {
            success: true,
            request,
            error: None,
            undo_token,
            new_asset_id,
        }
    }

    pub fn failed(request: OperationRequest, err: &OrganizeError) -> Self {
        Self {
            success: false,
            request,
            error: Some(err.into()),
            undo_token: None,
            new_asset_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<OperationResult>,
    pub errors: Vec<OperationError>,
}

/// What the user sees: counts and the first error, never the full list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub first_error: Option<OperationError>,
}

impl BatchReport {
    pub fn from_results(results: Vec<OperationResult>) -> Self {
        let errors: Vec<OperationError> = results.iter().filter_map(|r| r.error.clone()).collect();
        let succeeded = results.iter().filter(|r| r.success).count();

        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
            errors,
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            first_error: self.errors.first().cloned(),
        }
    }

    pub fn failed_requests(&self) -> Vec<OperationRequest> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.request.clone())
            .collect()
    }

    /// Failed requests worth resubmitting as-is.
    pub fn retryable_requests(&self) -> Vec<OperationRequest> {
        self.results
            .iter()
            .filter(|r| r.error.as_ref().is_some_and(|e| e.recoverable))
            .map(|r| r.request.clone())
            .collect()
    }

    pub fn undo_tokens(&self) -> Vec<UndoToken> {
        self.results.iter().filter_map(|r| r.undo_token).collect()
    }
}
