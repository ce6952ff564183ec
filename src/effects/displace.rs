use image::{GrayImage, RgbaImage};

use crate::config::Displacement;
use crate::effects::blend::{premultiply, unpremultiply};
use crate::foundation::error::{MockupError, MockupResult};

/// Shift every pixel of `src` by an amount read from `map`.
///
/// Map value 128 (neutral gray) leaves a pixel in place; 0 and 255 shift it
/// by the full negative/positive magnitude. Samples falling outside `src`
/// become transparent.
pub fn displace(src: &RgbaImage, map: &GrayImage, magnitude: Displacement) -> MockupResult<RgbaImage> {
    if src.dimensions() != map.dimensions() {
        return Err(MockupError::Other(anyhow::anyhow!(
            "displacement map is {}x{} but image is {}x{}",
            map.width(),
            map.height(),
            src.width(),
            src.height()
        )));
    }

    let (w, h) = src.dimensions();
    let mut out = RgbaImage::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let v = (f32::from(map.get_pixel(x, y).0[0]) - 127.5) / 127.5;
        let sx = x as f32 + v * magnitude.x;
        let sy = y as f32 + v * magnitude.y;
        px.0 = sample_bilinear(src, sx, sy);
    }
    Ok(out)
}

/// Bilinear sample at pixel-center coordinates, interpolating in premultiplied space.
pub fn sample_bilinear(src: &RgbaImage, x: f32, y: f32) -> [u8; 4] {
    let (w, h) = (src.width() as i64, src.height() as i64);
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let tap = |xi: i64, yi: i64| -> [f32; 4] {
        if xi < 0 || yi < 0 || xi >= w || yi >= h {
            return [0.0; 4];
        }
        let p = premultiply(src.get_pixel(xi as u32, yi as u32).0);
        [
            f32::from(p[0]),
            f32::from(p[1]),
            f32::from(p[2]),
            f32::from(p[3]),
        ]
    };

    let (a, b, c, d) = (tap(x0, y0), tap(x0 + 1, y0), tap(x0, y0 + 1), tap(x0 + 1, y0 + 1));
    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = a[i] + (b[i] - a[i]) * fx;
        let bottom = c[i] + (d[i] - c[i]) * fx;
        out[i] = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    // Rounding can leave a color channel above alpha; keep the pixel valid.
    for i in 0..3 {
        out[i] = out[i].min(out[3]);
    }
    unpremultiply(out)
}

#[cfg(test)]
#[path = "../../tests/unit/effects/displace.rs"]
mod tests;
