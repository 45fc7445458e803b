use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::camera::CameraPosition;
use crate::sampler::{SamplingStrategy, DEFAULT_WINDOW_SIZE};

pub const DEFAULT_CONFIG_FILE: &str = "colorspotter.toml";
pub const DEFAULT_LOOKUP_URL: &str = "https://www.thecolorapi.com";
pub const DEFAULT_ITEMS_KEY: &str = "items";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub camera: CameraConfig,
    pub sampling: SamplingConfig,
    pub lookup: LookupConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub position: CameraPosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub strategy: SamplingStrategy,
    pub window_size: u32,
    /// Crop captures to a centered square of at most this side before sampling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_side: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupConfig {
    pub base_url: String,
    /// Unset means the HTTP stack default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub items_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                width: 1280,
                height: 960,
                quality: 90,
                position: CameraPosition::Back,
            },
            sampling: SamplingConfig {
                strategy: SamplingStrategy::AreaAverage,
                window_size: DEFAULT_WINDOW_SIZE,
                crop_side: Some(300),
            },
            lookup: LookupConfig {
                base_url: DEFAULT_LOOKUP_URL.to_string(),
                timeout_secs: None,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("colorspotter_data"),
                items_key: DEFAULT_ITEMS_KEY.to_string(),
            },
        }
    }
}

impl Config {
    /// Loads `path`, writing the defaults there first if it does not exist.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();

        if config_path.exists() {
            Self::load_from_file(config_path)
        } else {
            log::info!("Config file not found, creating default configuration");
            let default_config = Self::default();
            default_config.save_to_file(config_path)?;
            Ok(default_config)
        }
    }

    /// Writes the default configuration to `path`. An existing file is only
    /// replaced when `overwrite` is set; returns whether anything was written.
    pub fn write_default<P: AsRef<Path>>(path: P, overwrite: bool) -> Result<bool> {
        let config_path = path.as_ref();
        if config_path.exists() && !overwrite {
            log::warn!("{} already exists, leaving it unchanged", config_path.display());
            return Ok(false);
        }
        Self::default().save_to_file(config_path)?;
        Ok(true)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| "Failed to parse configuration file")?;
        config.validate()?;

        log::info!("Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
            }
        }

        std::fs::write(path.as_ref(), contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        log::info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow::anyhow!("Invalid capture dimensions"));
        }

        if self.camera.quality > 100 {
            return Err(anyhow::anyhow!("Invalid JPEG quality: {}", self.camera.quality));
        }

        if self.sampling.window_size == 0 {
            return Err(anyhow::anyhow!("Invalid sampling window size"));
        }

        if self.sampling.crop_side == Some(0) {
            return Err(anyhow::anyhow!("Invalid crop side"));
        }

        let url = self.lookup.base_url.trim();
        if url.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow::anyhow!("Invalid lookup base URL: {:?}", self.lookup.base_url));
        }

        if self.storage.items_key.trim().is_empty() {
            return Err(anyhow::anyhow!("Storage key must not be empty"));
        }

        Ok(())
    }
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn capture_size(mut self, width: u32, height: u32) -> Self {
        self.config.camera.width = width;
        self.config.camera.height = height;
        self
    }

    pub fn position(mut self, position: CameraPosition) -> Self {
        self.config.camera.position = position;
        self
    }

    pub fn strategy(mut self, strategy: SamplingStrategy) -> Self {
        self.config.sampling.strategy = strategy;
        self
    }

    pub fn window_size(mut self, size: u32) -> Self {
        self.config.sampling.window_size = size;
        self
    }

    pub fn crop_side(mut self, side: Option<u32>) -> Self {
        self.config.sampling.crop_side = side;
        self
    }

    pub fn lookup_url(mut self, url: &str) -> Self {
        self.config.lookup.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn lookup_timeout(mut self, secs: Option<u64>) -> Self {
        self.config.lookup.timeout_secs = secs;
        self
    }

    pub fn data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.storage.data_dir = dir.into();
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
