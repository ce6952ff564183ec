//! Where finished mockups go.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use sha2::Digest as _;

use crate::assets::template::hex_lower;
use crate::foundation::error::{MockupError, MockupResult};

/// Storage capability for encoded mockups; returns a retrievable reference.
pub trait Publisher: Send + Sync {
    fn publish(&self, png: &[u8]) -> MockupResult<String>;
}

/// Content-addressed object name for an encoded mockup.
pub fn object_name(png: &[u8]) -> String {
    let digest = sha2::Sha256::digest(png);
    format!("mockup_{}.png", hex_lower(&digest[..8]))
}

/// Publishes into a local directory served under `base_url`.
#[derive(Clone, Debug)]
pub struct DirPublisher {
    root: PathBuf,
    base_url: String,
}

impl DirPublisher {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Publisher for DirPublisher {
    fn publish(&self, png: &[u8]) -> MockupResult<String> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            MockupError::publish(format!("create '{}': {e}", self.root.display()))
        })?;

        let name = object_name(png);
        let dst = self.root.join(&name);
        // Concurrent workers may publish identical bytes; each writes its own
        // temp file and the rename lands one complete copy.
        let tmp = self.root.join(format!(
            ".{name}.{}.{:?}.tmp",
            std::process::id(),
            std::thread::current().id()
        ));
        std::fs::write(&tmp, png)
            .map_err(|e| MockupError::publish(format!("write '{}': {e}", tmp.display())))?;
        std::fs::rename(&tmp, &dst).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            MockupError::publish(format!("rename into '{}': {e}", dst.display()))
        })?;

        tracing::debug!(path = %dst.display(), bytes = png.len(), "mockup published");
        Ok(format!("{}/{name}", self.base_url.trim_end_matches('/')))
    }
}

/// Keeps published mockups in memory, keyed by object name.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    objects: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of everything published so far, in publish order.
    pub fn objects(&self) -> Vec<(String, Vec<u8>)> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Publisher for MemoryPublisher {
    fn publish(&self, png: &[u8]) -> MockupResult<String> {
        let name = object_name(png);
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.clone(), png.to_vec()));
        Ok(format!("memory://{name}"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/batch/publish.rs"]
mod tests;
