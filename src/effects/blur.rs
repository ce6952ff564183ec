use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;

use crate::foundation::error::{MockupError, MockupResult};

/// Gaussian blur of a single-channel plane; `sigma == 0` returns the input unchanged.
pub fn blur_gray(src: &GrayImage, sigma: f32) -> MockupResult<GrayImage> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(MockupError::config("blur sigma must be >= 0"));
    }
    if sigma == 0.0 || src.width() == 0 || src.height() == 0 {
        return Ok(src.clone());
    }
    Ok(gaussian_blur_f32(src, sigma))
}

#[cfg(test)]
#[path = "../../tests/unit/effects/blur.rs"]
mod tests;
