use crate::foundation::error::{MockupError, MockupResult};

pub use kurbo::{Point, Rect, Vec2};

/// Pixel dimensions of a raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> MockupResult<Self> {
        if width == 0 || height == 0 {
            return Err(MockupError::config(format!(
                "raster size must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    pub fn of<I: image::GenericImageView>(img: &I) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height }
    }

    /// Scale to `target_width`, preserving aspect ratio.
    ///
    /// Height is truncated toward zero and never drops below one pixel.
    pub fn scaled_to_width(self, target_width: u32) -> Self {
        let h = (u64::from(target_width) * u64::from(self.height)) / u64::from(self.width.max(1));
        Self {
            width: target_width,
            height: (h.max(1)).min(u64::from(u32::MAX)) as u32,
        }
    }

    pub fn pixel_count(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Four corners of a destination quadrilateral, clockwise from top-left.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Quad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Quad {
    pub fn from_rect(r: Rect) -> Self {
        Self {
            top_left: Point::new(r.x0, r.y0),
            top_right: Point::new(r.x1, r.y0),
            bottom_right: Point::new(r.x1, r.y1),
            bottom_left: Point::new(r.x0, r.y1),
        }
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn translate(self, v: Vec2) -> Self {
        Self {
            top_left: self.top_left + v,
            top_right: self.top_right + v,
            bottom_right: self.bottom_right + v,
            bottom_left: self.bottom_left + v,
        }
    }

    /// Signed shoelace area; positive for the clockwise (screen-space) order.
    pub fn signed_area(&self) -> f64 {
        let c = self.corners();
        let mut acc = 0.0;
        for i in 0..4 {
            let a = c[i];
            let b = c[(i + 1) % 4];
            acc += a.x * b.y - b.x * a.y;
        }
        acc * 0.5
    }

    pub fn is_degenerate(&self) -> bool {
        let area = self.signed_area();
        !area.is_finite() || area.abs() < 1.0
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
