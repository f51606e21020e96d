pub mod cache;
pub mod generator;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::utils::{hash_str, short_hash};

pub use cache::{
    CacheEntryInfo, CacheError, CacheMetadata, CacheStats, ThumbnailCache, ThumbnailCacheSettings,
    CACHE_NAMESPACE,
};
pub use generator::{ImageThumbnailGenerator, ThumbnailGenerator};

pub const THUMBNAIL_EXTENSION: &str = "webp";

const DIMENSION_STEP: u32 = 64;
const MAX_EDGE: u32 = u32::MAX / DIMENSION_STEP * DIMENSION_STEP;
const QUALITY_STEP: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
}

impl RenderOptions {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self { width, height, quality }
    }

    pub fn square(edge: u32, quality: u8) -> Self {
        Self::new(edge, edge, quality)
    }

    /// Snap to coarse buckets so near-identical requests share one render.
    pub fn quantized(self) -> Self {
        let snap = |value: u32| {
            value
                .max(1)
                .div_ceil(DIMENSION_STEP)
                .saturating_mul(DIMENSION_STEP)
                .min(MAX_EDGE)
        };
        let quality = self.quality.clamp(1, 100);
        let quality = ((quality + QUALITY_STEP / 2) / QUALITY_STEP * QUALITY_STEP).clamp(QUALITY_STEP, 100);

        Self {
            width: snap(self.width),
            height: snap(self.height),
            quality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub asset_id: String,
    pub options: RenderOptions,
}

impl CacheKey {
    pub fn new(asset_id: &str, options: RenderOptions) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            options: options.quantized(),
        }
    }

    /// `<asset-hash>_<w>x<h>_q<quality>`, also the render's file stem.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}x{}_q{}",
            short_hash(&hash_str(&self.asset_id)),
            self.options.width,
            self.options.height,
            self.options.quality
        )
    }
}

/// Returns true if `stem` looks like a name produced by [`CacheKey::file_stem`].
pub fn is_cache_stem(stem: &str) -> bool {
    let Some((hash, rest)) = stem.split_once('_') else {
        return false;
    };
    let Some((dims, quality)) = rest.split_once("_q") else {
        return false;
    };
    let Some((width, height)) = dims.split_once('x') else {
        return false;
    };

    hash.len() == 16
        && hash.chars().all(|c| c.is_ascii_hexdigit())
        && width.parse::<u32>().is_ok()
        && height.parse::<u32>().is_ok()
        && quality.parse::<u8>().is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleSource {
    /// Rendered by this cache.
    Rendered,
    /// Preview the host index already had.
    Prerendered,
    /// Rendering failed; this is the asset itself.
    Original,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailHandle {
    pub path: PathBuf,
    pub source: HandleSource,
}
