use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::thumbnail::{RenderOptions, ThumbnailCacheSettings};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_cache_folder")]
    pub cache_folder: String,
    #[serde(default = "default_cache_max_bytes")]
    pub cache_max_bytes: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_preload_batch_size")]
    pub preload_batch_size: usize,
    #[serde(default = "default_undo_timeout_ms")]
    pub undo_timeout_ms: u64,
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,
    #[serde(default = "default_quality")]
    pub thumbnail_quality: u8,
    #[serde(default = "default_lookup_ttl_ms")]
    pub lookup_ttl_ms: u64,
}

fn default_cache_folder() -> String {
    get_default_cache_folder().unwrap_or_else(|_| String::from("~/.pengler/cache"))
}

fn default_cache_max_bytes() -> u64 {
    500 * 1024 * 1024
}

fn default_cache_capacity() -> usize {
    500
}

fn default_preload_batch_size() -> usize {
    10
}

fn default_undo_timeout_ms() -> u64 {
    5000
}

fn default_thumbnail_size() -> u32 {
    300
}

fn default_quality() -> u8 {
    85
}

fn default_lookup_ttl_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_folder: default_cache_folder(),
            cache_max_bytes: default_cache_max_bytes(),
            cache_capacity: default_cache_capacity(),
            preload_batch_size: default_preload_batch_size(),
            undo_timeout_ms: default_undo_timeout_ms(),
            thumbnail_size: default_thumbnail_size(),
            thumbnail_quality: default_quality(),
            lookup_ttl_ms: default_lookup_ttl_ms(),
        }
    }
}

impl Config {
    /// Load config from `path`, writing the defaults there if it does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;

        Ok(())
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache_folder).join("thumbnails")
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.cache_folder).join("pengler.db")
    }

    pub fn undo_timeout(&self) -> Duration {
        Duration::from_millis(self.undo_timeout_ms)
    }

    pub fn lookup_ttl(&self) -> Duration {
        Duration::from_millis(self.lookup_ttl_ms)
    }

    pub fn default_render_options(&self) -> RenderOptions {
        RenderOptions::square(self.thumbnail_size, self.thumbnail_quality)
    }

    pub fn cache_settings(&self) -> ThumbnailCacheSettings {
        ThumbnailCacheSettings {
            dir: self.thumbnails_dir(),
            max_bytes: self.cache_max_bytes,
            capacity: self.cache_capacity,
            preload_batch_size: self.preload_batch_size,
        }
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?;
    Ok(home.join(".pengler").join("config.toml"))
}

pub fn get_default_cache_folder() -> Result<String> {
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?;
    Ok(home.join(".pengler").join("cache").to_string_lossy().to_string())
}
