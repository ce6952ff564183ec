//! Swatch normalization: scale the artwork to a fixed width and place it on a
//! template-sized white canvas.

use std::{fs::File, io::BufWriter, path::Path};

use anyhow::Context as _;
use image::{RgbImage, RgbaImage, imageops::FilterType};

use crate::assets::decode::{SwatchBytes, decode_swatch};
use crate::config::MockupConfig;
use crate::foundation::core::Size;
use crate::foundation::error::{MockupError, MockupResult};

/// Largest scaled swatch height accepted, as a multiple of the template height.
pub const MAX_HEIGHT_FACTOR: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub swatch_width: u32,
    pub bottom_padding: u32,
}

impl NormalizeOptions {
    pub fn from_config(cfg: &MockupConfig) -> Self {
        Self {
            swatch_width: cfg.swatch_width,
            bottom_padding: cfg.bottom_padding,
        }
    }
}

/// Where the scaled swatch landed on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub size: Size,
}

/// Template-sized opaque canvas carrying the scaled swatch.
#[derive(Clone, Debug)]
pub struct NormalizedSwatch {
    pub canvas: RgbImage,
    pub placement: Placement,
}

impl NormalizedSwatch {
    pub fn size(&self) -> Size {
        Size::of(&self.canvas)
    }

    /// Persist the canvas as a JPEG artifact.
    pub fn write_jpeg(&self, path: &Path, quality: u8) -> MockupResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create artifact dir '{}'", parent.display()))?;
        }
        let f = File::create(path)
            .with_context(|| format!("create normalized swatch '{}'", path.display()))?;
        let mut enc =
            image::codecs::jpeg::JpegEncoder::new_with_quality(BufWriter::new(f), quality);
        enc.encode_image(&self.canvas)
            .with_context(|| format!("encode normalized swatch '{}'", path.display()))?;
        Ok(())
    }
}

/// Anchor for a `scaled` swatch on `canvas`: centered horizontally, sitting
/// `bottom_padding` above the bottom edge, never above the top edge.
pub fn placement(canvas: Size, scaled: Size, bottom_padding: u32) -> Placement {
    let x = (i64::from(canvas.width) - i64::from(scaled.width)) / 2;
    let y = i64::from(canvas.height) - i64::from(scaled.height) - i64::from(bottom_padding);
    Placement {
        x,
        y: y.max(0),
        size: scaled,
    }
}

/// Decode `swatch` and lay it out on a white canvas of `template_size`.
pub fn normalize(
    template_size: Size,
    swatch: &SwatchBytes,
    opts: NormalizeOptions,
) -> MockupResult<NormalizedSwatch> {
    if opts.swatch_width == 0 {
        return Err(MockupError::config("swatch_width must be > 0"));
    }
    let img = decode_swatch(swatch)?;
    let src_size = Size::of(&img);
    let scaled_size = src_size.scaled_to_width(opts.swatch_width);
    let max_height = template_size.height.saturating_mul(MAX_HEIGHT_FACTOR);
    if scaled_size.height > max_height {
        return Err(MockupError::decode(format!(
            "'{}' is {src_size}; scaling to width {} gives height {}, above the {max_height} limit",
            swatch.source, opts.swatch_width, scaled_size.height
        )));
    }
    let scaled = image::imageops::resize(
        &img.to_rgba8(),
        scaled_size.width,
        scaled_size.height,
        FilterType::Lanczos3,
    );

    let at = placement(template_size, scaled_size, opts.bottom_padding);
    let mut canvas = RgbaImage::from_pixel(
        template_size.width,
        template_size.height,
        image::Rgba([255, 255, 255, 255]),
    );
    image::imageops::overlay(&mut canvas, &scaled, at.x, at.y);

    tracing::debug!(
        source = %swatch.source,
        from = %src_size,
        to = %scaled_size,
        x = at.x,
        y = at.y,
        "swatch normalized"
    );

    Ok(NormalizedSwatch {
        canvas: image::DynamicImage::ImageRgba8(canvas).to_rgb8(),
        placement: at,
    })
}

#[cfg(test)]
#[path = "../tests/unit/swatch.rs"]
mod tests;
