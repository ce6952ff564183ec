use image::{GrayImage, RgbImage};

use crate::assets::template::TemplateSet;
use crate::config::MockupConfig;
use crate::effects::blur::blur_gray;
use crate::foundation::core::Size;
use crate::foundation::error::{MockupError, MockupResult};
use crate::foundation::math::{lerp_u8, luma_u8};

const NEUTRAL_GRAY: u8 = 128;

/// Inputs to map derivation beyond the template pair itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapParams {
    /// Percentage of full scale subtracted from luminance for the lighting map.
    pub brightness_delta: f32,
    pub displacement_blur_sigma: f32,
}

impl Default for MapParams {
    fn default() -> Self {
        Self {
            brightness_delta: 30.0,
            displacement_blur_sigma: 0.0,
        }
    }
}

impl MapParams {
    pub fn from_config(cfg: &MockupConfig) -> Self {
        Self {
            brightness_delta: cfg.brightness_delta,
            displacement_blur_sigma: cfg.displacement_blur_sigma,
        }
    }

    /// Stable textual form, part of the cache key.
    pub fn cache_tag(&self) -> String {
        format!(
            "delta={:.4};blur={:.4}",
            self.brightness_delta, self.displacement_blur_sigma
        )
    }
}

/// Per-template rasters shared by every item of a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedMaps {
    /// Relief map; 128 means no shift.
    pub displacement: GrayImage,
    /// Highlight map for the hard-light pass; never darker than 128.
    pub lighting: GrayImage,
    /// Tint map for the multiply pass; white outside the mask.
    pub adjustment: RgbImage,
}

impl DerivedMaps {
    pub fn size(&self) -> Size {
        Size::of(&self.displacement)
    }

    pub fn check_size(&self, expected: Size) -> MockupResult<()> {
        let sizes = [
            Size::of(&self.displacement),
            Size::of(&self.lighting),
            Size::of(&self.adjustment),
        ];
        if sizes.iter().any(|s| *s != expected) {
            return Err(MockupError::map_generation(format!(
                "derived maps {} / {} / {} do not match template {expected}",
                sizes[0], sizes[1], sizes[2]
            )));
        }
        Ok(())
    }
}

/// Derive displacement, lighting and adjustment maps from a template pair.
///
/// Pure and deterministic: the same pair and params always give identical
/// pixels. A mask whose dimensions differ from the template is an error.
#[tracing::instrument(skip(set), fields(size = %set.size()))]
pub fn generate_maps(set: &TemplateSet, params: MapParams) -> MockupResult<DerivedMaps> {
    set.check_dimensions()?;
    if !params.brightness_delta.is_finite() || !(0.0..=100.0).contains(&params.brightness_delta) {
        return Err(MockupError::map_generation(
            "brightness_delta must be within [0, 100]",
        ));
    }

    let luma = template_luma(set);
    let normalized = normalize_inside_mask(&luma, &set.mask);

    let displacement = {
        let raw = mix_toward(&normalized, &set.mask, NEUTRAL_GRAY);
        blur_gray(&raw, params.displacement_blur_sigma).map_err(|e| {
            MockupError::map_generation(format!("smooth displacement map: {e}"))
        })?
    };

    let lighting = {
        let delta = (params.brightness_delta / 100.0 * 255.0).round() as u8;
        let mut darkened = normalized.clone();
        for p in darkened.pixels_mut() {
            p.0[0] = p.0[0].saturating_sub(delta);
        }
        let mut flat = mix_toward(&darkened, &set.mask, NEUTRAL_GRAY);
        for p in flat.pixels_mut() {
            p.0[0] = p.0[0].max(NEUTRAL_GRAY);
        }
        flat
    };

    let adjustment = adjustment_map(set, &luma);

    let maps = DerivedMaps {
        displacement,
        lighting,
        adjustment,
    };
    maps.check_size(set.size())?;
    tracing::debug!("derived maps generated");
    Ok(maps)
}

fn template_luma(set: &TemplateSet) -> GrayImage {
    let (w, h) = set.template.dimensions();
    let mut out = GrayImage::new(w, h);
    for (dst, src) in out.pixels_mut().zip(set.template.pixels()) {
        let [r, g, b, _] = src.0;
        dst.0[0] = luma_u8(r, g, b);
    }
    out
}

/// Contrast-stretch luminance so the visible region spans the full 0..=255 range.
fn normalize_inside_mask(luma: &GrayImage, mask: &GrayImage) -> GrayImage {
    let mut lo = u8::MAX;
    let mut hi = u8::MIN;
    for (l, m) in luma.pixels().zip(mask.pixels()) {
        if m.0[0] > 0 {
            lo = lo.min(l.0[0]);
            hi = hi.max(l.0[0]);
        }
    }
    if lo >= hi {
        return luma.clone();
    }

    let span = u32::from(hi - lo);
    let mut out = luma.clone();
    for p in out.pixels_mut() {
        let v = u32::from(p.0[0].clamp(lo, hi) - lo);
        p.0[0] = ((v * 255 + span / 2) / span) as u8;
    }
    out
}

/// Blend `plane` toward `fill` wherever the mask is not fully opaque.
fn mix_toward(plane: &GrayImage, mask: &GrayImage, fill: u8) -> GrayImage {
    let mut out = plane.clone();
    for (p, m) in out.pixels_mut().zip(mask.pixels()) {
        p.0[0] = lerp_u8(fill, p.0[0], m.0[0]);
    }
    out
}

fn adjustment_map(set: &TemplateSet, luma: &GrayImage) -> RgbImage {
    let peak = luma
        .pixels()
        .zip(set.mask.pixels())
        .filter(|(_, m)| m.0[0] > 0)
        .map(|(l, _)| l.0[0])
        .max()
        .filter(|&p| p > 0)
        .unwrap_or(255);

    let (w, h) = set.template.dimensions();
    let mut out = RgbImage::new(w, h);
    for ((dst, src), m) in out
        .pixels_mut()
        .zip(set.template.pixels())
        .zip(set.mask.pixels())
    {
        for c in 0..3 {
            let lifted = ((u32::from(src.0[c]) * 255 + u32::from(peak) / 2) / u32::from(peak))
                .min(255) as u8;
            dst.0[c] = lerp_u8(255, lifted, m.0[0]);
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/maps/generate.rs"]
mod tests;
