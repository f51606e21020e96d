pub mod album;
pub mod media;
pub mod operation;

pub use album::{Album, AlbumCapabilities, AlbumKind, StorageLocation};
pub use media::{is_media_file, mime_type_for, AlbumId, Asset, AssetId, MediaType};
pub use operation::{
    BatchReport, BatchSummary, Confirmation, OperationError, OperationKind, OperationRequest,
    OperationResult,
};
