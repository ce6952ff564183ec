//! Named tunables for one template/mask/map set.
//!
//! Every component receives the pieces of [`MockupConfig`] it needs at
//! construction; nothing reads process-wide state.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{MockupError, MockupResult};

/// Where the derived maps live and whether a cached set may be reused.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapPaths {
    pub dir: PathBuf,
    pub displacement: String,
    pub lighting: String,
    pub adjustment: String,
    /// Skip regeneration when the on-disk fingerprint matches the template pair.
    pub reuse_cached: bool,
}

impl Default for MapPaths {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("maps"),
            displacement: "displacement_map.png".to_string(),
            lighting: "lighting_map.png".to_string(),
            adjustment: "adjustment_map.png".to_string(),
            reuse_cached: false,
        }
    }
}

impl MapPaths {
    pub fn displacement_path(&self) -> PathBuf {
        self.dir.join(&self.displacement)
    }

    pub fn lighting_path(&self) -> PathBuf {
        self.dir.join(&self.lighting)
    }

    pub fn adjustment_path(&self) -> PathBuf {
        self.dir.join(&self.adjustment)
    }

    pub fn fingerprint_path(&self) -> PathBuf {
        self.dir.join("maps.key")
    }
}

/// Maximum pixel shift of the displacement composite along each axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Displacement {
    pub x: f32,
    pub y: f32,
}

impl Default for Displacement {
    fn default() -> Self {
        Self { x: 20.0, y: 20.0 }
    }
}

/// Full configuration of the mockup pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MockupConfig {
    pub template_path: PathBuf,
    pub mask_path: PathBuf,
    pub maps: MapPaths,
    /// Root for per-item artifact directories.
    pub output_dir: PathBuf,
    /// Final mockup width; wider composites are downscaled to it.
    pub output_width: u32,
    /// Width the swatch is scaled to before placement on the canvas.
    pub swatch_width: u32,
    /// Gap between the bottom of the swatch and the bottom of the canvas.
    pub bottom_padding: u32,
    pub jpeg_quality: u8,
    /// Worker pool size; `None` uses the available parallelism.
    pub workers: Option<usize>,
    pub displacement: Displacement,
    /// Gaussian sigma applied to the displacement map; `0` disables smoothing.
    pub displacement_blur_sigma: f32,
    /// Percentage subtracted from template luminance when building the lighting map.
    pub brightness_delta: f32,
    /// Fraction of the template height the artwork is anchored at.
    pub vertical_anchor: f32,
    pub fetch_timeout_ms: u64,
    /// Keep `mockup.png` next to the normalized swatch in the item directory.
    pub keep_intermediates: bool,
}

impl Default for MockupConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("base_images/template.jpg"),
            mask_path: PathBuf::from("base_images/mask.png"),
            maps: MapPaths::default(),
            output_dir: PathBuf::from("mockups"),
            output_width: 800,
            swatch_width: 400,
            bottom_padding: 300,
            jpeg_quality: 85,
            workers: None,
            displacement: Displacement::default(),
            displacement_blur_sigma: 0.0,
            brightness_delta: 30.0,
            vertical_anchor: 0.75,
            fetch_timeout_ms: 30_000,
            keep_intermediates: false,
        }
    }
}

impl MockupConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> MockupResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path)
            .with_context(|| format!("read config '{}'", path.display()))
            .map_err(|e| MockupError::config(format!("{e:#}")))?;
        let cfg: Self = serde_json::from_slice(&raw).map_err(|e| {
            MockupError::config(format!("parse config '{}': {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> MockupResult<()> {
        if self.output_width == 0 {
            return Err(MockupError::config("output_width must be > 0"));
        }
        if self.swatch_width == 0 {
            return Err(MockupError::config("swatch_width must be > 0"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(MockupError::config("jpeg_quality must be in 1..=100"));
        }
        if self.workers == Some(0) {
            return Err(MockupError::config("workers must be >= 1 when set"));
        }
        if !self.vertical_anchor.is_finite() || !(0.0..=1.0).contains(&self.vertical_anchor) {
            return Err(MockupError::config("vertical_anchor must be in [0, 1]"));
        }
        if !self.brightness_delta.is_finite() || !(0.0..=100.0).contains(&self.brightness_delta) {
            return Err(MockupError::config("brightness_delta must be in [0, 100]"));
        }
        let d = self.displacement;
        if !d.x.is_finite() || !d.y.is_finite() || d.x < 0.0 || d.y < 0.0 {
            return Err(MockupError::config(
                "displacement magnitudes must be finite and >= 0",
            ));
        }
        if !self.displacement_blur_sigma.is_finite() || self.displacement_blur_sigma < 0.0 {
            return Err(MockupError::config("displacement_blur_sigma must be >= 0"));
        }
        Ok(())
    }

    /// Resolved worker count for the batch pool.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
