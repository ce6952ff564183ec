//! Projective placement of the normalized swatch onto the template canvas.
//!
//! The recipe only ever produces axis-aligned destination quads, but the warp
//! itself is a full 3x3 projection so corner pins stay expressible.

use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

use crate::foundation::core::{Point, Quad, Rect, Size};
use crate::foundation::error::{CompositeStep, MockupError, MockupResult};

/// Surround `img` with `px` fully transparent pixels on every side.
pub fn add_border(img: &RgbaImage, px: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    let mut out = RgbaImage::from_pixel(w + 2 * px, h + 2 * px, Rgba([0, 0, 0, 0]));
    image::imageops::replace(&mut out, img, i64::from(px), i64::from(px));
    out
}

/// Destination of an `artwork`-sized box on a `template` canvas.
///
/// Horizontal center is the canvas center. The vertical center sits at
/// `vertical_anchor * height` raised by half the artwork height, and the box
/// is placed around that center.
pub fn destination_quad(template: Size, artwork: Size, vertical_anchor: f32) -> Quad {
    Quad::from_rect(destination_rect(template, artwork, vertical_anchor))
}

/// Axis-aligned box behind [`destination_quad`].
pub fn destination_rect(template: Size, artwork: Size, vertical_anchor: f32) -> Rect {
    let half_w = i64::from(artwork.width / 2);
    let half_h = i64::from(artwork.height / 2);
    let x_center = i64::from(template.width / 2);
    let y_center = (f64::from(template.height) * f64::from(vertical_anchor)).floor() as i64 - half_h;

    Rect::new(
        (x_center - half_w) as f64,
        (y_center - half_h) as f64,
        (x_center + half_w) as f64,
        (y_center + half_h) as f64,
    )
}

/// Map the corners of `src` onto `dst` and render the result into a transparent
/// canvas of size `canvas`. Pixels of the canvas not covered by the warped
/// source stay transparent.
pub fn warp_onto_canvas(src: &RgbaImage, dst: Quad, canvas: Size) -> MockupResult<RgbaImage> {
    if dst.is_degenerate() {
        return Err(MockupError::transform(
            CompositeStep::PerspectiveWarp,
            format!("degenerate destination quad {dst:?}"),
        ));
    }

    let (w, h) = (f64::from(src.width()), f64::from(src.height()));
    let from = Quad::from_rect(Rect::new(0.0, 0.0, w, h));
    let projection = Projection::from_control_points(to_f32(from), to_f32(dst)).ok_or_else(|| {
        MockupError::transform(
            CompositeStep::PerspectiveWarp,
            "corner mapping has no projective solution",
        )
    })?;

    let mut out = RgbaImage::from_pixel(canvas.width, canvas.height, Rgba([0, 0, 0, 0]));
    warp_into(
        src,
        &projection,
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
        &mut out,
    );
    Ok(out)
}

/// Force every pixel to be either fully opaque or fully transparent.
pub fn flatten_alpha(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        px.0[3] = if px.0[3] >= 128 { 255 } else { 0 };
    }
}

fn to_f32(q: Quad) -> [(f32, f32); 4] {
    q.corners().map(|p: Point| (p.x as f32, p.y as f32))
}

#[cfg(test)]
#[path = "../../tests/unit/transform/perspective.rs"]
mod tests;
