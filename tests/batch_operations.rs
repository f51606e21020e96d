mod common;

use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use common::{library, organizer, organizer_with, test_config, unsorted_photo, GB};
use pengler_organizer::index::{DeleteOutcome, IndexError, IndexResult};
use pengler_organizer::models::AssetId;
use pengler_organizer::task_manager::TaskStatus;
use pengler_organizer::thumbnail::ImageThumbnailGenerator;
use pengler_organizer::{
    AccessScope, Album, Asset, Config, ErrorKind, HostMediaIndex, OperationRequest, OrganizeError,
    Organizer, PermissionGate,
};
use tempfile::TempDir;

fn error_kind(report: &pengler_organizer::BatchReport, index: usize) -> Option<ErrorKind> {
    report.results[index].error.as_ref().map(|e| e.kind)
}

#[test]
fn move_succeeds_while_unconfirmed_delete_is_cancelled() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let organizer = organizer(&dir, index.clone());

    let report = organizer
        .submit(&[
            OperationRequest::move_to("photoA", "albumX"),
            OperationRequest::delete("photoB", false),
        ])
        .unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.results.len(), 2);
    assert_eq!(index.asset("photoA").unwrap().album_id.as_deref(), Some("albumX"));
    assert_eq!(index.asset("photoB").unwrap().album_id.as_deref(), Some("camera"));
    assert_eq!(error_kind(&report, 1), Some(ErrorKind::UserCancelled));
    assert!(report.results[0].undo_token.is_some());
}

#[test]
fn copy_without_enough_storage_is_fatal_and_touches_nothing() {
    let dir = TempDir::new().unwrap();
    let index = library();
    index.set_free_storage(GB);
    let organizer = organizer(&dir, index.clone());
    let assets_before = index.asset_count();

    let report = organizer.submit(&[OperationRequest::copy_to("photoC", "albumY")]).unwrap();

    let error = report.results[0].error.clone().unwrap();
    assert_eq!(error.kind, ErrorKind::InsufficientStorage);
    assert!(!error.recoverable);
    assert_eq!(index.asset_count(), assets_before);
    assert_eq!(index.album("albumY").unwrap().item_count, 0);
    assert_eq!(index.change_count(), 0);
    assert!(report.retryable_requests().is_empty());
}

#[test]
fn copy_leaves_source_album_untouched() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let organizer = organizer(&dir, index.clone());

    let report = organizer.submit(&[OperationRequest::copy_to("photoA", "albumY")]).unwrap();
    assert!(report.is_complete_success());

    let duplicate_id = report.results[0].new_asset_id.clone().unwrap();
    assert_ne!(duplicate_id, "photoA");
    assert_eq!(index.asset("photoA").unwrap().album_id.as_deref(), Some("camera"));
    assert_eq!(index.asset(&duplicate_id).unwrap().album_id.as_deref(), Some("albumY"));

    // Undoing a copy deletes the duplicate only.
    assert!(organizer.undo(report.results[0].undo_token.unwrap()));
    assert!(index.asset(&duplicate_id).is_none());
    assert!(index.asset("photoA").is_some());
}

#[test]
fn failures_are_isolated_per_item() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let organizer = organizer(&dir, index.clone());

    let report = organizer
        .submit(&[
            OperationRequest::move_to("ghost", "albumX"),
            OperationRequest::move_to("photoA", "nowhere"),
            OperationRequest::copy_to("photoB", "albumX"),
            OperationRequest::delete("photoD", true),
        ])
        .unwrap();

    assert_eq!(report.total, 4);
    assert_eq!((report.succeeded, report.failed), (2, 2));
    assert_eq!(report.errors.len(), 2);
    assert_eq!(error_kind(&report, 0), Some(ErrorKind::AssetNotFound));
    assert_eq!(error_kind(&report, 1), Some(ErrorKind::AlbumNotFound));
    assert!(report.results[2].success);
    assert!(report.results[3].success);

    let summary = report.summary();
    assert_eq!(summary.first_error.unwrap().kind, ErrorKind::AssetNotFound);
    assert_eq!(report.retryable_requests().len(), 2);
}

#[test]
fn requests_apply_in_submission_order() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let organizer = organizer(&dir, index.clone());

    let report = organizer
        .submit(&[
            OperationRequest::move_to("photoA", "albumX"),
            OperationRequest::move_to("photoA", "albumY"),
        ])
        .unwrap();

    assert!(report.is_complete_success());
    assert_eq!(index.asset("photoA").unwrap().album_id.as_deref(), Some("albumY"));
    assert_eq!(index.album("albumX").unwrap().item_count, 0);
    assert_eq!(index.album("albumY").unwrap().item_count, 1);

    // Undoing the second move returns the asset to the first target.
    assert!(organizer.undo(report.results[1].undo_token.unwrap()));
    assert_eq!(index.asset("photoA").unwrap().album_id.as_deref(), Some("albumX"));
}

#[test]
fn move_of_asset_without_album_undoes_to_no_album() {
    let dir = TempDir::new().unwrap();
    let index = library();
    index.insert_asset(unsorted_photo("loose"));
    let organizer = organizer(&dir, index.clone());

    let report = organizer.submit(&[OperationRequest::move_to("loose", "albumX")]).unwrap();
    assert_eq!(index.asset("loose").unwrap().album_id.as_deref(), Some("albumX"));

    assert!(organizer.undo(report.results[0].undo_token.unwrap()));
    assert_eq!(index.asset("loose").unwrap().album_id, None);
}

#[test]
fn moving_into_current_album_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let organizer = organizer(&dir, index.clone());

    let report = organizer.submit(&[OperationRequest::move_to("photoA", "camera")]).unwrap();
    assert!(report.results[0].success);
    assert!(report.results[0].undo_token.is_none());
    assert_eq!(index.album("camera").unwrap().item_count, 4);
}

#[test]
fn read_only_albums_reject_writes_and_deletes() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let mut favorite = unsorted_photo("fav");
    favorite.album_id = Some("favorites".into());
    index.insert_asset(favorite);
    let organizer = organizer(&dir, index.clone());

    let report = organizer
        .submit(&[
            OperationRequest::move_to("photoA", "favorites"),
            OperationRequest::copy_to("photoA", "favorites"),
            OperationRequest::delete("fav", true),
        ])
        .unwrap();

    assert_eq!(report.failed, 3);
    assert!(report.errors.iter().all(|e| e.kind == ErrorKind::PermissionDenied && e.recoverable));
    assert!(index.asset("fav").is_some());
    assert_eq!(index.asset("photoA").unwrap().album_id.as_deref(), Some("camera"));
}

#[test]
fn unmounted_removable_album_is_fatal() {
    let dir = TempDir::new().unwrap();
    let index = library();
    index.set_volume_mounted("/media/sd", false);
    let organizer = organizer(&dir, index.clone());

    let report = organizer
        .submit(&[
            OperationRequest::move_to("photoA", "sdcard"),
            OperationRequest::move_to("photoB", "albumX"),
        ])
        .unwrap();

    let error = report.results[0].error.clone().unwrap();
    assert_eq!(error.kind, ErrorKind::RemovableMediaUnavailable);
    assert!(!error.recoverable);
    assert!(report.results[1].success);
    assert!(report.retryable_requests().is_empty());
    assert_eq!(report.failed_requests(), vec![OperationRequest::move_to("photoA", "sdcard")]);
}

#[test]
fn retry_resubmits_only_recoverable_failures() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let organizer = organizer(&dir, index.clone());

    let first = organizer
        .submit(&[
            OperationRequest::move_to("late", "albumX"),
            OperationRequest::move_to("photoA", "albumX"),
        ])
        .unwrap();
    assert_eq!(first.failed, 1);

    index.insert_asset(unsorted_photo("late"));
    let retry = organizer.retry_failed(&first).unwrap();

    assert_eq!(retry.total, 1);
    assert_eq!(retry.succeeded, 1);
    assert_eq!(index.asset("late").unwrap().album_id.as_deref(), Some("albumX"));
}

#[test]
fn index_change_is_signalled_only_after_a_success() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let organizer = organizer(&dir, index.clone());

    organizer.submit(&[OperationRequest::delete("photoA", false)]).unwrap();
    assert_eq!(index.change_count(), 0);

    organizer.submit(&[OperationRequest::move_to("photoA", "albumX")]).unwrap();
    assert_eq!(index.change_count(), 1);
}

#[test]
fn counts_always_add_up() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let organizer = organizer(&dir, index.clone());

    let ids = ["photoA", "photoB", "ghost", "photoD"];
    let albums = ["albumX", "albumY", "nowhere", "favorites"];
    for round in 0..4 {
        let requests: Vec<OperationRequest> = (0..6)
            .map(|i| {
                let id = ids[(i + round) % ids.len()];
                let album = albums[(i * 3 + round) % albums.len()];
                match (i + round) % 3 {
                    0 => OperationRequest::move_to(id, album),
                    1 => OperationRequest::copy_to(id, album),
                    _ => OperationRequest::delete(id, i % 2 == 0),
                }
            })
            .collect();

        let report = organizer.submit(&requests).unwrap();
        assert_eq!(report.total, requests.len());
        assert_eq!(report.results.len(), requests.len());
        assert_eq!(report.succeeded + report.failed, report.total);
        assert_eq!(report.errors.len(), report.failed);
        for (result, request) in report.results.iter().zip(&requests) {
            assert_eq!(&result.request, request);
            assert_eq!(result.success, result.error.is_none());
        }
    }
}

struct DenyModify;

impl PermissionGate for DenyModify {
    fn is_granted(&self, scope: AccessScope) -> bool {
        scope == AccessScope::Read
    }
}

#[test]
fn denied_permission_rejects_whole_batch() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let organizer = Organizer::with_parts(
        test_config(&dir),
        index.clone(),
        Arc::new(ImageThumbnailGenerator),
        None,
        Arc::new(DenyModify),
    )
    .unwrap();

    let result = organizer.submit(&[OperationRequest::move_to("photoA", "albumX")]);
    assert!(matches!(result, Err(OrganizeError::PermissionDenied(_))));
    assert_eq!(index.asset("photoA").unwrap().album_id.as_deref(), Some("camera"));
    assert!(matches!(organizer.create_album("New"), Err(OrganizeError::PermissionDenied(_))));
}

#[test]
fn album_creation_rejects_duplicate_titles() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let organizer = organizer(&dir, index.clone());

    let album = organizer.create_album("Holidays").unwrap();
    assert_eq!(index.album(&album.id).unwrap().title, "Holidays");

    let err = organizer.create_album(" holidays ").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlbumAlreadyExists);
}

#[test]
fn default_album_comes_from_the_flag_not_the_title() {
    let dir = TempDir::new().unwrap();
    let index = library();
    index.insert_album(Album::user("mine", "Camera"));
    let organizer = organizer(&dir, index);

    let default = organizer.default_album().unwrap().unwrap();
    assert_eq!(default.id, "camera");
    assert_eq!(default.title, "All Photos");
}

/// Wraps the in-memory index. Once armed, the next asset lookup blocks until
/// released, holding a batch in flight. Removals from `failing_album` fail.
struct ScriptedIndex {
    inner: Arc<pengler_organizer::InMemoryMediaIndex>,
    entered: Mutex<Option<Sender<()>>>,
    release: Mutex<Option<Receiver<()>>>,
    failing_album: Option<String>,
}

impl ScriptedIndex {
    fn new(inner: Arc<pengler_organizer::InMemoryMediaIndex>) -> Self {
        Self {
            inner,
            entered: Mutex::new(None),
            release: Mutex::new(None),
            failing_album: None,
        }
    }

    fn failing_removal_from(mut self, album: &str) -> Self {
        self.failing_album = Some(album.to_string());
        self
    }

    /// Returns (entered, release): the first fires when a lookup blocks, the
    /// second lets it go on.
    fn arm(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.entered.lock().unwrap() = Some(entered_tx);
        *self.release.lock().unwrap() = Some(release_rx);
        (entered_rx, release_tx)
    }
}

impl HostMediaIndex for ScriptedIndex {
    fn resolve_asset(&self, id: &str) -> IndexResult<Option<Asset>> {
        let entered = self.entered.lock().unwrap().take();
        if let Some(entered) = entered {
            let release = self.release.lock().unwrap().take().unwrap();
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        self.inner.resolve_asset(id)
    }

    fn resolve_album(&self, id: &str) -> IndexResult<Option<Album>> {
        self.inner.resolve_album(id)
    }

    fn list_albums(&self) -> IndexResult<Vec<Album>> {
        self.inner.list_albums()
    }

    fn add_asset_to_album(&self, asset: &Asset, album: &Album, duplicate: bool) -> IndexResult<Option<AssetId>> {
        self.inner.add_asset_to_album(asset, album, duplicate)
    }

    fn remove_asset_from_album(&self, asset: &Asset, album: &Album) -> IndexResult<()> {
        if self.failing_album.as_deref() == Some(album.id.as_str()) {
            return Err(IndexError::Host(format!("{} is locked", album.id)));
        }
        self.inner.remove_asset_from_album(asset, album)
    }

    fn delete_asset(&self, asset: &Asset) -> IndexResult<DeleteOutcome> {
        self.inner.delete_asset(asset)
    }

    fn restore_asset(&self, id: &str) -> IndexResult<()> {
        self.inner.restore_asset(id)
    }

    fn create_album(&self, name: &str) -> IndexResult<Album> {
        self.inner.create_album(name)
    }

    fn query_free_storage_bytes(&self) -> IndexResult<u64> {
        self.inner.query_free_storage_bytes()
    }

    fn is_volume_mounted(&self, volume: &Path) -> bool {
        self.inner.is_volume_mounted(volume)
    }

    fn notify_index_changed(&self) {
        self.inner.notify_index_changed()
    }
}

#[test]
fn concurrent_submit_and_undo_are_rejected_while_a_batch_runs() {
    let dir = TempDir::new().unwrap();
    let inner = library();
    let scripted = Arc::new(ScriptedIndex::new(inner.clone()));
    let organizer: Arc<Organizer> = Arc::new(organizer_with(test_config(&dir), scripted.clone()));

    let earlier = organizer.submit(&[OperationRequest::move_to("photoD", "albumX")]).unwrap();
    let token = earlier.results[0].undo_token.unwrap();

    let (entered, release) = scripted.arm();
    let running = {
        let organizer = organizer.clone();
        thread::spawn(move || organizer.submit(&[OperationRequest::move_to("photoA", "albumX")]))
    };
    entered.recv().unwrap();

    let progress = organizer.batch_progress().unwrap();
    assert_eq!(progress.status, TaskStatus::Running);
    assert_eq!((progress.total, progress.processed), (1, 0));
    assert!(matches!(
        organizer.submit(&[OperationRequest::move_to("photoB", "albumY")]),
        Err(OrganizeError::EngineBusy)
    ));
    // Undo waits its turn and keeps the token.
    assert!(!organizer.undo(token));
    assert_eq!(inner.asset("photoD").unwrap().album_id.as_deref(), Some("albumX"));

    release.send(()).unwrap();
    let report = running.join().unwrap().unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(organizer.batch_progress().is_none());
    assert_eq!(inner.asset("photoB").unwrap().album_id.as_deref(), Some("camera"));

    // The slot is free again.
    assert!(organizer.undo(token));
    assert_eq!(inner.asset("photoD").unwrap().album_id.as_deref(), Some("camera"));
    let next = organizer.submit(&[OperationRequest::move_to("photoB", "albumY")]).unwrap();
    assert_eq!(next.succeeded, 1);
}

#[test]
fn failed_source_removal_rolls_the_move_back() {
    let dir = TempDir::new().unwrap();
    let inner = library();
    let scripted = Arc::new(ScriptedIndex::new(inner.clone()).failing_removal_from("camera"));
    let organizer = organizer_with(test_config(&dir), scripted);

    let report = organizer
        .submit(&[
            OperationRequest::move_to("photoA", "albumX"),
            OperationRequest::move_to("photoB", "albumY"),
        ])
        .unwrap();

    assert_eq!(report.failed, 2);
    assert_eq!(error_kind(&report, 0), Some(ErrorKind::AdapterFailure));
    assert!(report.results[0].undo_token.is_none());
    assert_eq!(inner.asset("photoA").unwrap().album_id.as_deref(), Some("camera"));
    assert_eq!(inner.asset("photoB").unwrap().album_id.as_deref(), Some("camera"));
    assert_eq!(inner.album("albumX").unwrap().item_count, 0);
    assert_eq!(inner.album("camera").unwrap().item_count, 4);
}

#[test]
fn undoing_a_stale_move_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let index = library();
    let organizer = organizer(&dir, index.clone());

    let first = organizer.submit(&[OperationRequest::move_to("photoA", "albumX")]).unwrap();
    organizer.submit(&[OperationRequest::move_to("photoA", "albumY")]).unwrap();

    assert!(!organizer.undo(first.results[0].undo_token.unwrap()));
    assert_eq!(index.asset("photoA").unwrap().album_id.as_deref(), Some("albumY"));
    assert_eq!(index.album("albumY").unwrap().item_count, 1);
    assert_eq!(index.album("albumX").unwrap().item_count, 0);
    assert_eq!(index.album("camera").unwrap().item_count, 3);
}

#[test]
fn config_driven_organizer_uses_sqlite_store() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        cache_folder: dir.path().join("cache").to_string_lossy().to_string(),
        ..Config::default()
    };
    let organizer = Organizer::new(config.clone(), library(), Arc::new(pengler_organizer::AllowAll)).unwrap();

    assert!(config.database_path().exists());
    assert!(config.thumbnails_dir().is_dir());
    assert_eq!(organizer.cache_stats().entry_count, 0);
}
