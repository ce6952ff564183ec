use image::{GrayImage, RgbImage, RgbaImage};

use crate::foundation::error::{MockupError, MockupResult};
use crate::foundation::math::{mul_div255_u16, mul_div255_u8};

pub type PremulRgba8 = [u8; 4];

/// Separable blend modes used by the compositing recipe.
///
/// `dst` is the artwork underneath, `src` the map laid on top.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Multiply,
    HardLight,
    Lighten,
}

impl BlendMode {
    pub fn channel(self, dst: u8, src: u8) -> u8 {
        let (d, s) = (u16::from(dst), u16::from(src));
        match self {
            Self::Multiply => mul_div255_u8(d, s),
            Self::HardLight => {
                if s < 128 {
                    mul_div255_u16(2 * s, d).min(255) as u8
                } else {
                    let inv = mul_div255_u16(2 * (255 - s), 255 - d).min(255);
                    (255 - inv) as u8
                }
            }
            Self::Lighten => dst.max(src),
        }
    }
}

/// Porter-Duff source-over on premultiplied pixels with an extra coverage factor.
pub fn over(dst: PremulRgba8, src: PremulRgba8, coverage: u8) -> PremulRgba8 {
    if coverage == 0 || src[3] == 0 {
        return dst;
    }

    let op = u16::from(coverage);
    let sa = mul_div255_u8(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255_u8(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255_u8(u16::from(src[i]), op);
        let dc = mul_div255_u8(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

pub fn premultiply(px: [u8; 4]) -> PremulRgba8 {
    let a = u16::from(px[3]);
    if a == 0 {
        return [0, 0, 0, 0];
    }
    [
        mul_div255_u8(u16::from(px[0]), a),
        mul_div255_u8(u16::from(px[1]), a),
        mul_div255_u8(u16::from(px[2]), a),
        px[3],
    ]
}

pub fn unpremultiply(px: PremulRgba8) -> [u8; 4] {
    let a = u32::from(px[3]);
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let un = |c: u8| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8;
    [un(px[0]), un(px[1]), un(px[2]), px[3]]
}

/// Blend `layer` onto the colors of `dst`.
///
/// The layer is treated as opaque, so the result alpha is the union of both
/// coverages (fully opaque). Callers restore the artwork footprint with
/// [`copy_opacity`].
pub fn blend_rgb_in_place(dst: &mut RgbaImage, layer: &RgbImage, mode: BlendMode) -> MockupResult<()> {
    expect_same_dims(dst.dimensions(), layer.dimensions(), "blend layer")?;
    for (d, s) in dst.pixels_mut().zip(layer.pixels()) {
        blend_px(&mut d.0, s.0, mode);
    }
    Ok(())
}

/// Same as [`blend_rgb_in_place`] for a single-channel layer.
pub fn blend_gray_in_place(dst: &mut RgbaImage, layer: &GrayImage, mode: BlendMode) -> MockupResult<()> {
    expect_same_dims(dst.dimensions(), layer.dimensions(), "blend layer")?;
    for (d, s) in dst.pixels_mut().zip(layer.pixels()) {
        let v = s.0[0];
        blend_px(&mut d.0, [v, v, v], mode);
    }
    Ok(())
}

fn blend_px(d: &mut [u8; 4], s: [u8; 3], mode: BlendMode) {
    for c in 0..3 {
        d[c] = mode.channel(d[c], s[c]);
    }
    d[3] = 255;
}

/// Replace the alpha of `dst` with the alpha of `source`.
pub fn copy_opacity(dst: &mut RgbaImage, source: &RgbaImage) -> MockupResult<()> {
    expect_same_dims(dst.dimensions(), source.dimensions(), "opacity source")?;
    for (d, s) in dst.pixels_mut().zip(source.pixels()) {
        d.0[3] = s.0[3];
    }
    Ok(())
}

/// Composite `src` over `dst` with per-pixel coverage taken from `mask`.
pub fn over_masked_in_place(dst: &mut RgbaImage, src: &RgbaImage, mask: &GrayImage) -> MockupResult<()> {
    expect_same_dims(dst.dimensions(), src.dimensions(), "overlay")?;
    expect_same_dims(dst.dimensions(), mask.dimensions(), "mask")?;
    for ((d, s), m) in dst.pixels_mut().zip(src.pixels()).zip(mask.pixels()) {
        let out = over(premultiply(d.0), premultiply(s.0), m.0[0]);
        d.0 = unpremultiply(out);
    }
    Ok(())
}

fn expect_same_dims(a: (u32, u32), b: (u32, u32), what: &str) -> MockupResult<()> {
    if a != b {
        return Err(MockupError::Other(anyhow::anyhow!(
            "{what} is {}x{} but image is {}x{}",
            b.0,
            b.1,
            a.0,
            a.1
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/effects/blend.rs"]
mod tests;
