use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

/// Largest album page the photo service accepts.
pub const MAX_ALBUMS_PAGE_SIZE: u32 = 50;
/// Largest media-item page the photo service accepts.
pub const MAX_PHOTOS_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StorageOptions {
    /// JSON document backing the key/value store.
    pub path: PathBuf,
    /// Account the stored values belong to.
    pub user: String,
    pub photos_prefix: String,
    pub notes_prefix: String,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dashboard-state.json"),
            user: "default".to_string(),
            photos_prefix: "PHOTOS".to_string(),
            notes_prefix: "NOTES".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServiceOptions {
    pub base_url: String,
    /// Environment variable holding the bearer token issued by the external sign-in flow.
    pub token_env: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            base_url: "https://photoslibrary.googleapis.com".to_string(),
            token_env: "PHOTOS_ACCESS_TOKEN".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Description of the host device, as reported by the embedding shell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DeviceInfo {
    pub platform: Option<String>,
    pub max_touch_points: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Time between automatic photo changes. Rotation only advances on request when unset.
    #[serde(with = "humantime_serde")]
    pub rotation_interval: Option<Duration>,
    /// Fixed output surface the renderer composes onto.
    pub surface: SurfaceSize,
    /// Fill used for the side bars around a composed image.
    pub background_color: [u8; 3],
    /// Opacity added per animation frame while fading a new image in.
    pub fade_step: f32,
    /// Pace of the fade-in animation.
    #[serde(with = "humantime_serde")]
    pub frame_interval: Duration,
    pub albums_page_size: u32,
    pub photos_page_size: u32,
    pub storage: StorageOptions,
    pub service: ServiceOptions,
    pub device: Option<DeviceInfo>,
    /// PNG file receiving each fully faded-in frame.
    pub frame_output: Option<PathBuf>,
    /// Optional deterministic seed for the rotation RNG.
    pub rng_seed: Option<u64>,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.surface.width > 0 && self.surface.height > 0,
            "surface dimensions must be greater than zero"
        );
        ensure!(
            self.fade_step > 0.0 && self.fade_step <= 1.0,
            "fade-step must be within (0, 1]"
        );
        ensure!(
            !self.frame_interval.is_zero(),
            "frame-interval must be greater than zero"
        );
        ensure!(
            (1..=MAX_ALBUMS_PAGE_SIZE).contains(&self.albums_page_size),
            "albums-page-size must be between 1 and {MAX_ALBUMS_PAGE_SIZE}"
        );
        ensure!(
            (1..=MAX_PHOTOS_PAGE_SIZE).contains(&self.photos_page_size),
            "photos-page-size must be between 1 and {MAX_PHOTOS_PAGE_SIZE}"
        );
        if let Some(interval) = self.rotation_interval {
            ensure!(
                !interval.is_zero(),
                "rotation-interval must be greater than zero when set"
            );
        }
        ensure!(
            !self.storage.photos_prefix.is_empty() && !self.storage.notes_prefix.is_empty(),
            "storage prefixes must not be empty"
        );
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            rotation_interval: None,
            surface: SurfaceSize::default(),
            background_color: [255, 255, 255],
            fade_step: 0.01,
            frame_interval: Duration::from_millis(16),
            albums_page_size: 15,
            photos_page_size: MAX_PHOTOS_PAGE_SIZE,
            storage: StorageOptions::default(),
            service: ServiceOptions::default(),
            device: None,
            frame_output: None,
            rng_seed: None,
        }
    }
}
