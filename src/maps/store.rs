use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;
use image::ImageFormat;

use crate::assets::template::TemplateSet;
use crate::config::MapPaths;
use crate::foundation::core::Size;
use crate::foundation::error::{MockupError, MockupResult};
use crate::maps::generate::{DerivedMaps, MapParams, generate_maps};

/// Fixed on-disk home of the derived maps for one template.
///
/// Writes go through a sibling temp file and a rename, so a reader never sees
/// a half-written map and regenerating simply replaces the previous set.
#[derive(Clone, Debug)]
pub struct MapStore {
    paths: MapPaths,
}

impl MapStore {
    pub fn new(paths: MapPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &MapPaths {
        &self.paths
    }

    /// Return maps for `set`, regenerating unless a matching cached set may be reused.
    ///
    /// Every failure is reported as [`MockupError::MapGeneration`].
    #[tracing::instrument(skip(self, set), fields(dir = %self.paths.dir.display()))]
    pub fn ensure(&self, set: &TemplateSet, params: MapParams) -> MockupResult<DerivedMaps> {
        set.check_dimensions()?;
        let key = cache_key(set, params);

        if self.paths.reuse_cached && self.cached_key().as_deref() == Some(key.as_str()) {
            match self.load(set.size()) {
                Ok(maps) => {
                    tracing::info!("reusing cached derived maps");
                    return Ok(maps);
                }
                Err(e) => tracing::warn!(error = %e, "cached maps unreadable, regenerating"),
            }
        }

        let maps = generate_maps(set, params)?;
        self.write(&maps, &key)?;
        tracing::info!(size = %maps.size(), "derived maps written");
        Ok(maps)
    }

    pub fn write(&self, maps: &DerivedMaps, key: &str) -> MockupResult<()> {
        std::fs::create_dir_all(&self.paths.dir)
            .with_context(|| format!("create map dir '{}'", self.paths.dir.display()))
            .map_err(map_err)?;

        save_atomic(&self.paths.displacement_path(), |p, f| {
            maps.displacement.save_with_format(p, f)
        })?;
        save_atomic(&self.paths.lighting_path(), |p, f| {
            maps.lighting.save_with_format(p, f)
        })?;
        save_atomic(&self.paths.adjustment_path(), |p, f| {
            maps.adjustment.save_with_format(p, f)
        })?;

        let key_path = self.paths.fingerprint_path();
        let tmp = tmp_sibling(&key_path);
        std::fs::write(&tmp, key)
            .and_then(|()| std::fs::rename(&tmp, &key_path))
            .with_context(|| format!("write map key '{}'", key_path.display()))
            .map_err(|e| {
                let _ = std::fs::remove_file(&tmp);
                map_err(e)
            })
    }

    pub fn load(&self, expected: Size) -> MockupResult<DerivedMaps> {
        let maps = DerivedMaps {
            displacement: open(&self.paths.displacement_path())?.to_luma8(),
            lighting: open(&self.paths.lighting_path())?.to_luma8(),
            adjustment: open(&self.paths.adjustment_path())?.to_rgb8(),
        };
        maps.check_size(expected)?;
        Ok(maps)
    }

    fn cached_key(&self) -> Option<String> {
        std::fs::read_to_string(self.paths.fingerprint_path())
            .ok()
            .map(|s| s.trim().to_string())
    }
}

pub fn cache_key(set: &TemplateSet, params: MapParams) -> String {
    format!("{};{}", set.fingerprint(), params.cache_tag())
}

fn save_atomic(
    path: &Path,
    save: impl FnOnce(&Path, ImageFormat) -> image::ImageResult<()>,
) -> MockupResult<()> {
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
    let tmp = tmp_sibling(path);
    if let Err(e) = save(&tmp, format) {
        let _ = std::fs::remove_file(&tmp);
        return Err(map_err(
            anyhow::Error::new(e).context(format!("encode map '{}'", path.display())),
        ));
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("replace map '{}'", path.display()))
        .map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            map_err(e)
        })
}

/// Unique per call, so concurrent writers in one process never share a temp file.
fn tmp_sibling(path: &Path) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "map".to_string());
    let seq = NEXT.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

fn open(path: &Path) -> MockupResult<image::DynamicImage> {
    image::open(path)
        .with_context(|| format!("open map '{}'", path.display()))
        .map_err(map_err)
}

fn map_err(e: anyhow::Error) -> MockupError {
    MockupError::map_generation(format!("{e:#}"))
}

#[cfg(test)]
#[path = "../../tests/unit/maps/store.rs"]
mod tests;
