use std::io::Cursor;

use image::{RgbaImage, imageops::FilterType};

use crate::assets::template::TemplateSet;
use crate::config::{Displacement, MockupConfig};
use crate::effects::blend::{BlendMode, blend_gray_in_place, blend_rgb_in_place, copy_opacity, over_masked_in_place};
use crate::effects::displace::displace;
use crate::foundation::core::{Quad, Size};
use crate::foundation::error::{CompositeStep, MockupError, MockupResult};
use crate::maps::generate::DerivedMaps;
use crate::swatch::NormalizedSwatch;
use crate::transform::perspective::{add_border, destination_rect, flatten_alpha, warp_onto_canvas};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositeOptions {
    /// Width of the encoded mockup.
    pub output_width: u32,
    pub vertical_anchor: f32,
    pub displacement: Displacement,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self::from_config(&MockupConfig::default())
    }
}

impl CompositeOptions {
    pub fn from_config(cfg: &MockupConfig) -> Self {
        Self {
            output_width: cfg.output_width,
            vertical_anchor: cfg.vertical_anchor,
            displacement: cfg.displacement,
        }
    }
}

/// Final mockup raster and its PNG encoding.
#[derive(Clone, Debug)]
pub struct Mockup {
    pub image: RgbaImage,
    pub png: Vec<u8>,
}

impl Mockup {
    pub fn size(&self) -> Size {
        Size::of(&self.image)
    }
}

/// Borrowed view of everything shared by all items of a batch.
#[derive(Clone, Copy, Debug)]
pub struct Compositor<'a> {
    set: &'a TemplateSet,
    maps: &'a DerivedMaps,
    opts: CompositeOptions,
}

impl<'a> Compositor<'a> {
    pub fn new(set: &'a TemplateSet, maps: &'a DerivedMaps, opts: CompositeOptions) -> Self {
        Self { set, maps, opts }
    }

    /// Size every normalized swatch must have.
    pub fn canvas_size(&self) -> Size {
        self.set.size()
    }

    /// Run the full recipe on one normalized swatch.
    ///
    /// Steps run strictly in order; each consumes the previous raster:
    /// border, perspective warp, alpha flatten, displace, highlight, adjust, merge.
    pub fn composite(&self, swatch: &NormalizedSwatch) -> MockupResult<Mockup> {
        let canvas = self.set.size();

        let bordered = step(CompositeStep::Border, || {
            if swatch.size() != canvas {
                anyhow::bail!(
                    "normalized swatch is {} but template is {canvas}",
                    swatch.size()
                );
            }
            let rgba = image::DynamicImage::ImageRgb8(swatch.canvas.clone()).to_rgba8();
            Ok(add_border(&rgba, 1))
        })?;

        let warped = step(CompositeStep::PerspectiveWarp, || {
            // The quad is computed for the unbordered artwork; grow it by the
            // border so interior pixels keep a 1:1 mapping.
            let rect = destination_rect(canvas, swatch.size(), self.opts.vertical_anchor);
            let dst = Quad::from_rect(rect.inflate(1.0, 1.0));
            Ok(warp_onto_canvas(&bordered, dst, canvas)?)
        })?;

        let flat = step(CompositeStep::AlphaFlatten, || {
            let mut img = warped;
            flatten_alpha(&mut img);
            Ok(img)
        })?;

        let displaced = step(CompositeStep::Displace, || {
            Ok(displace(&flat, &self.maps.displacement, self.opts.displacement)?)
        })?;

        let highlighted = step(CompositeStep::Highlight, || {
            let mut img = displaced.clone();
            blend_gray_in_place(&mut img, &self.maps.lighting, BlendMode::HardLight)?;
            copy_opacity(&mut img, &displaced)?;
            Ok(img)
        })?;

        let adjusted = step(CompositeStep::Adjust, || {
            let mut img = highlighted.clone();
            blend_rgb_in_place(&mut img, &self.maps.adjustment, BlendMode::Multiply)?;
            copy_opacity(&mut img, &highlighted)?;
            Ok(img)
        })?;

        step(CompositeStep::Merge, || {
            let mut base = self.set.template.clone();
            over_masked_in_place(&mut base, &adjusted, &self.set.mask)?;
            let image = resize_to_width(base, self.opts.output_width);
            let mut png = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
                .map_err(|e| anyhow::anyhow!("encode png: {e}"))?;
            Ok(Mockup { image, png })
        })
    }
}

/// Resize to exactly `width`, preserving aspect ratio; enlarges narrower images too.
pub fn resize_to_width(img: RgbaImage, width: u32) -> RgbaImage {
    let size = Size::of(&img);
    if size.width == width || width == 0 {
        return img;
    }
    let target = size.scaled_to_width(width);
    image::imageops::resize(&img, target.width, target.height, FilterType::Lanczos3)
}

/// Run one pipeline step, tagging any failure with the step name.
fn step<T>(name: CompositeStep, f: impl FnOnce() -> anyhow::Result<T>) -> MockupResult<T> {
    tracing::trace!(step = %name, "composite step");
    f().map_err(|e| match e.downcast::<MockupError>() {
        Ok(MockupError::Transform { step, message }) => MockupError::Transform { step, message },
        Ok(other) => MockupError::transform(name, other.to_string()),
        Err(e) => MockupError::transform(name, format!("{e:#}")),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
