use serde::Serialize;

/// Convenience result type used across the mockup pipeline.
pub type MockupResult<T> = Result<T, MockupError>;

/// Named steps of the per-item compositing pipeline.
///
/// Transform failures carry the step they happened in so a failed item can be
/// diagnosed without re-running it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeStep {
    /// Transparent 1px border around the normalized swatch.
    Border,
    /// Projective placement of the swatch onto the template canvas.
    PerspectiveWarp,
    /// Removal of residual semi-transparency after the warp.
    AlphaFlatten,
    /// Pixel shift driven by the displacement map.
    Displace,
    /// Hard-light against the lighting map, clipped to the artwork alpha.
    Highlight,
    /// Multiply against the adjustment map, clipped to the artwork alpha.
    Adjust,
    /// Template + artwork + mask merge, resize and PNG encode.
    Merge,
}

impl CompositeStep {
    /// Stable snake_case name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Border => "border",
            Self::PerspectiveWarp => "perspective_warp",
            Self::AlphaFlatten => "alpha_flatten",
            Self::Displace => "displace",
            Self::Highlight => "highlight",
            Self::Adjust => "adjust",
            Self::Merge => "merge",
        }
    }
}

impl std::fmt::Display for CompositeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error taxonomy for map generation, per-item processing and configuration.
///
/// Everything except [`MockupError::MapGeneration`] and [`MockupError::Config`]
/// is scoped to a single batch item.
#[derive(thiserror::Error, Debug)]
pub enum MockupError {
    /// Invalid configuration values or unreadable configuration files.
    #[error("config error: {0}")]
    Config(String),

    /// Network or HTTP failure, or a non-image response, for one source URL.
    #[error("fetch error: {url}: {message}")]
    Fetch {
        /// Source URL that failed.
        url: String,
        /// Human readable cause.
        message: String,
    },

    /// Swatch bytes that are not a decodable image.
    #[error("decode error: {0}")]
    Decode(String),

    /// A compositing step failed.
    #[error("transform error at {step}: {message}")]
    Transform {
        /// Pipeline step that failed.
        step: CompositeStep,
        /// Human readable cause.
        message: String,
    },

    /// Storage rejected the final raster.
    #[error("publish error: {0}")]
    Publish(String),

    /// Derived maps could not be produced; fatal for the whole batch.
    #[error("map generation error: {0}")]
    MapGeneration(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MockupError {
    /// Build a [`MockupError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`MockupError::Fetch`] value.
    pub fn fetch(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Build a [`MockupError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build a [`MockupError::Transform`] value tagged with `step`.
    pub fn transform(step: CompositeStep, msg: impl Into<String>) -> Self {
        Self::Transform {
            step,
            message: msg.into(),
        }
    }

    /// Build a [`MockupError::Publish`] value.
    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    /// Build a [`MockupError::MapGeneration`] value.
    pub fn map_generation(msg: impl Into<String>) -> Self {
        Self::MapGeneration(msg.into())
    }

    /// Whether this error aborts a whole batch rather than a single item.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::MapGeneration(_) | Self::Config(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
