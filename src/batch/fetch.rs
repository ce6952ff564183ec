//! Where swatch bytes come from.

use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::assets::decode::{SwatchBytes, is_image_content_type};
use crate::config::MockupConfig;
use crate::foundation::error::{MockupError, MockupResult};

/// Source of raw swatch bytes, shared by every worker of a batch.
pub trait SwatchSource: Send + Sync {
    fn fetch(&self, url: &str) -> MockupResult<SwatchBytes>;
}

/// Blocking HTTP(S) fetcher that also reads `file://` URLs from disk.
#[derive(Clone, Debug)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> MockupResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("swatch-mockup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MockupError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_config(cfg: &MockupConfig) -> MockupResult<Self> {
        Self::new(Duration::from_millis(cfg.fetch_timeout_ms))
    }

    fn fetch_http(&self, url: &str) -> MockupResult<SwatchBytes> {
        let res = self
            .client
            .get(url)
            .send()
            .map_err(|e| MockupError::fetch(url, format!("HTTP GET failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            return Err(MockupError::fetch(url, format!("HTTP status {status}")));
        }

        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        match content_type.as_deref() {
            Some(ct) if is_image_content_type(ct) => {}
            Some(ct) => {
                return Err(MockupError::fetch(url, format!("not an image (content type '{ct}')")));
            }
            None => return Err(MockupError::fetch(url, "response has no content type")),
        }

        let bytes = res
            .bytes()
            .map_err(|e| MockupError::fetch(url, format!("failed to read response body: {e}")))?;
        if bytes.is_empty() {
            return Err(MockupError::fetch(url, "empty response body"));
        }
        Ok(SwatchBytes::new(url, content_type, bytes.to_vec()))
    }
}

impl SwatchSource for HttpSource {
    fn fetch(&self, url: &str) -> MockupResult<SwatchBytes> {
        if let Some(path) = url.strip_prefix("file://") {
            return fetch_file(url, Path::new(path));
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.fetch_http(url);
        }
        Err(MockupError::fetch(url, "unsupported URL scheme"))
    }
}

/// Read a local swatch; the content type follows the file extension.
pub fn fetch_file(url: &str, path: &Path) -> MockupResult<SwatchBytes> {
    let content_type = image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type().to_owned())
        .map_err(|_| MockupError::fetch(url, "not an image (unknown file extension)"))?;
    let bytes = std::fs::read(path)
        .map_err(|e| MockupError::fetch(url, format!("read '{}': {e}", path.display())))?;
    if bytes.is_empty() {
        return Err(MockupError::fetch(url, "empty file"));
    }
    Ok(SwatchBytes::new(url, Some(content_type), bytes))
}

#[cfg(test)]
#[path = "../../tests/unit/batch/fetch.rs"]
mod tests;
