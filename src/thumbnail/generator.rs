use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::Result;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;

use super::RenderOptions;
use crate::models::{Asset, MediaType};

/// Renders a scaled preview of an asset into `dest`.
pub trait ThumbnailGenerator: Send + Sync {
    /// Returns the size in bytes of the written file.
    fn render(&self, asset: &Asset, options: &RenderOptions, dest: &Path) -> Result<u64>;

    /// Whether `options.quality` changes the output. When it does not, every
    /// quality of one size shares a single cached render.
    fn uses_quality(&self) -> bool {
        true
    }
}

/// Photos through the `image` crate, videos through an `ffmpeg` frame grab.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageThumbnailGenerator;

impl ThumbnailGenerator for ImageThumbnailGenerator {
    fn render(&self, asset: &Asset, options: &RenderOptions, dest: &Path) -> Result<u64> {
        match asset.media_type {
            MediaType::Photo => generate_image_thumbnail(&asset.file_path, dest, options)?,
            MediaType::Video => generate_video_thumbnail(&asset.file_path, dest, options)?,
        }
        Ok(fs::metadata(dest)?.len())
    }

    // WebP output from the image crate is lossless only.
    fn uses_quality(&self) -> bool {
        false
    }
}

fn generate_image_thumbnail(source_path: &Path, dest: &Path, options: &RenderOptions) -> Result<()> {
    let img = image::open(source_path)?;
    let thumbnail = img.resize(options.width, options.height, FilterType::Lanczos3);

    let encoder = WebPEncoder::new_lossless(fs::File::create(dest)?);
    thumbnail.write_with_encoder(encoder)?;

    Ok(())
}

fn generate_video_thumbnail(source_path: &Path, dest: &Path, options: &RenderOptions) -> Result<()> {
    let temp_png = dest.with_extension("frame.png");

    let output = Command::new("ffmpeg")
        .arg("-ss").arg("1")
        .arg("-i").arg(source_path)
        .arg("-vframes").arg("1")
        .arg("-vf").arg(format!(
            "scale={}:{}:force_original_aspect_ratio=decrease",
            options.width, options.height
        ))
        .arg("-y")
        .arg(&temp_png)
        .output();

    let result = match output {
        Ok(result) if result.status.success() => generate_image_thumbnail(&temp_png, dest, options),
        Ok(result) => {
            let stderr = String::from_utf8_lossy(&result.stderr);
            Err(anyhow::anyhow!("ffmpeg failed: {}", stderr))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(anyhow::anyhow!(
            "ffmpeg not found. Please install ffmpeg to generate video thumbnails."
        )),
        Err(e) => Err(anyhow::anyhow!("Failed to run ffmpeg: {}", e)),
    };

    let _ = fs::remove_file(&temp_png);
    result
}
