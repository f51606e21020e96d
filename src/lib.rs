//! Photo organization engine.
//!
//! Moves, copies and deletes assets between albums of a host media index with
//! per-item failure isolation and short-lived undo, and serves grid previews
//! from a size-bounded LRU thumbnail cache.

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod models;
pub mod organizer;
pub mod permission;
pub mod task_manager;
pub mod thumbnail;
pub mod undo;
pub mod utils;

pub use batch::BatchEngine;
pub use config::Config;
pub use error::{ErrorKind, OrganizeError, Result};
pub use index::{AssetIndexAdapter, DeleteOutcome, HostMediaIndex, InMemoryMediaIndex, IndexError};
pub use models::{
    Album, Asset, BatchReport, MediaType, OperationKind, OperationRequest, OperationResult,
};
pub use organizer::Organizer;
pub use permission::{AccessScope, AllowAll, PermissionGate};
pub use thumbnail::{HandleSource, RenderOptions, ThumbnailCache, ThumbnailHandle};
pub use undo::{ReversibleAction, UndoRegistry, UndoToken};
