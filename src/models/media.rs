use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type AssetId = String;
pub type AlbumId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub media_type: MediaType,
    pub file_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub file_size: u64,
    pub mime_type: String,
    /// Album the asset currently lives in. Only a successful move changes it.
    pub album_id: Option<AlbumId>,
    /// Where the asset came from (camera, import, download...).
    pub source: String,
    /// Preview the host index already rendered, if any.
    pub thumbnail_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
}

impl Asset {
    pub fn new(id: impl Into<AssetId>, file_path: impl Into<PathBuf>, media_type: MediaType, file_size: u64) -> Self {
        let file_path = file_path.into();
        let mime_type = mime_type_for(&file_path).unwrap_or("application/octet-stream").to_string();
        let now = Utc::now();

        Self {
            id: id.into(),
            media_type,
            file_path,
            width: 0,
            height: 0,
            created_at: now,
            modified_at: now,
            file_size,
            mime_type,
            album_id: None,
            source: String::from("local"),
            thumbnail_path: None,
        }
    }

    pub fn in_album(mut self, album_id: impl Into<AlbumId>) -> Self {
        self.album_id = Some(album_id.into());
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_thumbnail(mut self, path: impl Into<PathBuf>) -> Self {
        self.thumbnail_path = Some(path.into());
        self
    }

    /// Build an asset from a file on disk. The path doubles as identity.
    pub fn from_path(path: &Path) -> Result<Self> {
        let path_str = path.to_string_lossy().to_string();
        let media_type = is_media_file(&path_str)
            .ok_or_else(|| anyhow::anyhow!("Not a media file: {}", path.display()))?;

        let metadata = std::fs::metadata(path)?;
        let modified_at = DateTime::<Utc>::from(metadata.modified()?);
        let created_at = metadata
            .created()
            .map(DateTime::<Utc>::from)
            .unwrap_or(modified_at);

        let (width, height) = match media_type {
            MediaType::Photo => image::image_dimensions(path).unwrap_or((0, 0)),
            MediaType::Video => (0, 0),
        };

        let mut asset = Asset::new(path_str, path, media_type, metadata.len())
            .with_dimensions(width, height);
        asset.created_at = created_at;
        asset.modified_at = modified_at;

        Ok(asset)
    }
}

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "heif"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

fn extension(path: &Path) -> Option<String> {
    Some(path.extension()?.to_str()?.to_lowercase())
}

pub fn is_media_file(path: &str) -> Option<MediaType> {
    let ext = extension(Path::new(path))?;

    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaType::Photo)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaType::Video)
    } else {
        None
    }
}

pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let mime = match extension(path)?.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}
