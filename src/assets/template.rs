use std::path::Path;

use image::{GrayImage, RgbaImage};
use sha2::Digest as _;

use crate::foundation::core::Size;
use crate::foundation::error::{MockupError, MockupResult};
use crate::foundation::math::mul_div255_u8;

/// Template photo and its mask, loaded once and shared read-only by every worker.
#[derive(Clone, Debug)]
pub struct TemplateSet {
    /// Base product photo, straight-alpha RGBA8.
    pub template: RgbaImage,
    /// Per-pixel visibility of the artwork: mask luminance times mask alpha.
    pub mask: GrayImage,
    fingerprint: String,
}

impl TemplateSet {
    /// Load the template/mask pair from disk.
    ///
    /// Without a template there is nothing to derive maps from, so read and
    /// decode failures surface as [`MockupError::MapGeneration`].
    pub fn load(template_path: &Path, mask_path: &Path) -> MockupResult<Self> {
        let template = open_raster(template_path, "template")?.to_rgba8();
        let mask = mask_coverage(&open_raster(mask_path, "mask")?);
        Ok(Self::from_images(template, mask))
    }

    pub fn from_images(template: RgbaImage, mask: GrayImage) -> Self {
        let fingerprint = fingerprint(&template, &mask);
        Self {
            template,
            mask,
            fingerprint,
        }
    }

    pub fn size(&self) -> Size {
        Size::of(&self.template)
    }

    pub fn mask_size(&self) -> Size {
        Size::of(&self.mask)
    }

    /// Content hash of the pair; keys the on-disk map cache.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn check_dimensions(&self) -> MockupResult<()> {
        if self.size() != self.mask_size() {
            return Err(MockupError::map_generation(format!(
                "mask is {} but template is {}",
                self.mask_size(),
                self.size()
            )));
        }
        if self.size().pixel_count() == 0 {
            return Err(MockupError::map_generation("template is empty"));
        }
        Ok(())
    }
}

fn open_raster(path: &Path, what: &str) -> MockupResult<image::DynamicImage> {
    image::open(path).map_err(|e| {
        MockupError::map_generation(format!("open {what} '{}': {e}", path.display()))
    })
}

/// Collapse a mask raster (gray, gray+alpha or RGBA) to a single coverage plane.
pub fn mask_coverage(mask: &image::DynamicImage) -> GrayImage {
    let la = mask.to_luma_alpha8();
    let (w, h) = la.dimensions();
    let mut out = GrayImage::new(w, h);
    for (dst, src) in out.pixels_mut().zip(la.pixels()) {
        dst.0[0] = mul_div255_u8(u16::from(src.0[0]), u16::from(src.0[1]));
    }
    out
}

fn fingerprint(template: &RgbaImage, mask: &GrayImage) -> String {
    let mut h = sha2::Sha256::new();
    for v in [
        template.width(),
        template.height(),
        mask.width(),
        mask.height(),
    ] {
        h.update(v.to_le_bytes());
    }
    h.update(template.as_raw());
    h.update(mask.as_raw());
    hex_lower(&h.finalize())
}

pub(crate) fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/assets/template.rs"]
mod tests;
