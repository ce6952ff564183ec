//! Product mockups from flat swatch images.
//!
//! A fixed template photo and its mask are turned once into three derived maps
//! (displacement, lighting, adjustment). Each swatch in a batch is then
//! normalized onto a template-sized canvas, warped into place, pushed through
//! the relief and shading passes, merged onto the template and published.
//!
//! - Derive maps with [`generate_maps`] or the caching [`MapStore`]
//! - Composite a single swatch with [`normalize`] and [`Compositor`]
//! - Fan a list of URLs out over a bounded pool with [`BatchRunner`]
#![forbid(unsafe_code)]

pub mod assets;
pub mod batch;
pub mod config;
pub mod effects;
pub mod foundation;
pub mod maps;
pub mod render;
pub mod swatch;
pub mod transform;

pub use crate::foundation::core::{Point, Quad, Rect, Size, Vec2};
pub use crate::foundation::error::{CompositeStep, MockupError, MockupResult};

pub use crate::assets::decode::SwatchBytes;
pub use crate::assets::template::TemplateSet;
pub use crate::batch::fetch::{HttpSource, SwatchSource};
pub use crate::batch::orchestrator::{BatchReport, BatchRunner, ItemOutcome, ItemResult, ItemStage};
pub use crate::batch::publish::{DirPublisher, MemoryPublisher, Publisher};
pub use crate::config::{Displacement, MapPaths, MockupConfig};
pub use crate::maps::generate::{DerivedMaps, MapParams, generate_maps};
pub use crate::maps::store::MapStore;
pub use crate::render::compositor::{CompositeOptions, Compositor, Mockup};
pub use crate::swatch::{NormalizeOptions, NormalizedSwatch, normalize};
