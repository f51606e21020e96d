use std::sync::Arc;

use anyhow::Result as AnyResult;
use tracing::{info, warn};

use crate::batch::BatchEngine;
use crate::config::{get_config_path, Config};
use crate::db::{Database, KeyValueStore};
use crate::error::{OrganizeError, Result};
use crate::index::{AssetIndexAdapter, HostMediaIndex};
use crate::models::{Album, Asset, BatchReport, OperationRequest};
use crate::permission::{AccessScope, PermissionGate};
use crate::task_manager::TaskInfo;
use crate::thumbnail::{
    CacheStats, ImageThumbnailGenerator, RenderOptions, ThumbnailCache, ThumbnailGenerator,
    ThumbnailHandle,
};
use crate::undo::{UndoRegistry, UndoToken};

/// Entry point for callers. Owns one instance of every engine component;
/// nothing is global, so two organizers never share state.
pub struct Organizer {
    config: Config,
    adapter: Arc<AssetIndexAdapter>,
    registry: Arc<UndoRegistry>,
    engine: BatchEngine,
    thumbnails: ThumbnailCache,
    permissions: Arc<dyn PermissionGate>,
}

impl Organizer {
    /// Load `~/.pengler/config.toml` and build with the default generator and store.
    pub fn open_default(index: Arc<dyn HostMediaIndex>, permissions: Arc<dyn PermissionGate>) -> AnyResult<Self> {
        let config = Config::load(&get_config_path()?)?;
        Self::new(config, index, permissions)
    }

    /// Thumbnails through the `image` crate, metadata in `pengler.db` under the cache folder.
    pub fn new(config: Config, index: Arc<dyn HostMediaIndex>, permissions: Arc<dyn PermissionGate>) -> AnyResult<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(Database::open(&config.database_path())?);
        Self::with_parts(config, index, Arc::new(ImageThumbnailGenerator), Some(store), permissions)
    }

    pub fn with_parts(
        config: Config,
        index: Arc<dyn HostMediaIndex>,
        generator: Arc<dyn ThumbnailGenerator>,
        store: Option<Arc<dyn KeyValueStore>>,
        permissions: Arc<dyn PermissionGate>,
    ) -> AnyResult<Self> {
        let adapter = Arc::new(AssetIndexAdapter::new(index, config.lookup_ttl()));
        let registry = Arc::new(UndoRegistry::new(config.undo_timeout()));
        let engine = BatchEngine::new(adapter.clone(), registry.clone());
        let thumbnails = ThumbnailCache::open(config.cache_settings(), generator, store)?;

        Ok(Self {
            config,
            adapter,
            registry,
            engine,
            thumbnails,
            permissions,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn require(&self, scope: AccessScope) -> Result<()> {
        if self.permissions.is_granted(scope) {
            Ok(())
        } else {
            Err(OrganizeError::PermissionDenied(format!("{:?} access to the media library", scope)))
        }
    }

    pub fn submit(&self, requests: &[OperationRequest]) -> Result<BatchReport> {
        self.require(AccessScope::Modify)?;
        self.registry.purge_expired();

        let report = self.engine.submit(requests)?;
        if report.succeeded > 0 {
            self.adapter.notify_index_changed();
        }
        Ok(report)
    }

    /// Resubmit the recoverable failures of an earlier batch.
    pub fn retry_failed(&self, report: &BatchReport) -> Result<BatchReport> {
        self.submit(&report.retryable_requests())
    }

    pub fn batch_progress(&self) -> Option<TaskInfo> {
        self.engine.progress()
    }

    /// Never fails: problems are logged and reported as `false`.
    pub fn undo(&self, token: UndoToken) -> bool {
        match self.engine.undo(token) {
            Ok(()) => {
                self.adapter.notify_index_changed();
                true
            }
            Err(e) => {
                warn!(%token, error = %e, "Undo not applied");
                false
            }
        }
    }

    pub fn create_album(&self, name: &str) -> Result<Album> {
        self.require(AccessScope::Modify)?;
        let album = self.adapter.create_album(name)?;
        info!(album = %album.id, title = %album.title, "Album created");
        self.adapter.notify_index_changed();
        Ok(album)
    }

    pub fn default_album(&self) -> Result<Option<Album>> {
        self.require(AccessScope::Read)?;
        self.adapter.default_album()
    }

    pub fn resolve_asset(&self, id: &str) -> Result<Asset> {
        self.require(AccessScope::Read)?;
        self.adapter.resolve_asset(id)
    }

    pub fn notify_index_changed(&self) {
        self.adapter.notify_index_changed();
    }

    pub fn get_thumbnail(&self, asset: &Asset, options: RenderOptions) -> ThumbnailHandle {
        self.thumbnails.get(asset, options)
    }

    pub fn preload_thumbnails(&self, assets: &[Asset], options: RenderOptions) {
        self.thumbnails.preload(assets, options);
    }

    pub fn resize_cache_budget(&self, bytes: u64) {
        self.thumbnails.resize(bytes);
    }

    pub fn clear_thumbnail_cache(&self) {
        self.thumbnails.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.thumbnails.stats()
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }
}
