use image::DynamicImage;

use crate::foundation::error::{MockupError, MockupResult};

/// Raw swatch payload as delivered by a [`SwatchSource`](crate::SwatchSource).
#[derive(Clone, Debug)]
pub struct SwatchBytes {
    /// URL or path the bytes came from.
    pub source: String,
    /// Declared media type, if the transport reported one.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SwatchBytes {
    pub fn new(source: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            content_type,
            bytes,
        }
    }
}

pub fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}

/// Decode a swatch, rejecting non-image declared content types up front.
pub fn decode_swatch(swatch: &SwatchBytes) -> MockupResult<DynamicImage> {
    if let Some(ct) = swatch.content_type.as_deref()
        && !is_image_content_type(ct)
    {
        return Err(MockupError::decode(format!(
            "'{}' declared content type '{ct}', expected image/*",
            swatch.source
        )));
    }
    if swatch.bytes.is_empty() {
        return Err(MockupError::decode(format!(
            "'{}' has an empty body",
            swatch.source
        )));
    }

    let img = image::load_from_memory(&swatch.bytes)
        .map_err(|e| MockupError::decode(format!("'{}': {e}", swatch.source)))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(MockupError::decode(format!(
            "'{}' decoded to an empty raster",
            swatch.source
        )));
    }
    Ok(img)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
