//! Batch fan-out: shared maps first, then one pipeline per URL on a bounded pool.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::assets::template::TemplateSet;
use crate::batch::fetch::{HttpSource, SwatchSource};
use crate::batch::publish::Publisher;
use crate::config::MockupConfig;
use crate::foundation::error::{MockupError, MockupResult};
use crate::maps::generate::{DerivedMaps, MapParams};
use crate::maps::store::MapStore;
use crate::render::compositor::{CompositeOptions, Compositor};
use crate::swatch::{NormalizeOptions, normalize};

/// Lifecycle of one batch item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStage {
    Queued,
    Fetching,
    Normalizing,
    Compositing,
    Publishing,
    Done,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Done {
        url: String,
    },
    Failed {
        /// Stage the item was in when it failed.
        stage: ItemStage,
        message: String,
    },
}

/// Outcome for one requested URL, tagged with its request identity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ItemResult {
    pub index: usize,
    pub source_url: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl ItemResult {
    pub fn is_done(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Done { .. })
    }

    /// Published reference, when the item succeeded.
    pub fn url(&self) -> Option<&str> {
        match &self.outcome {
            ItemOutcome::Done { url } => Some(url),
            ItemOutcome::Failed { .. } => None,
        }
    }

    /// Final state: [`ItemStage::Done`] or [`ItemStage::Failed`].
    pub fn final_stage(&self) -> ItemStage {
        if self.is_done() {
            ItemStage::Done
        } else {
            ItemStage::Failed
        }
    }
}

/// Batch response body: `{success, message, data}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchReport {
    pub success: bool,
    pub message: String,
    pub data: Vec<ItemResult>,
}

impl BatchReport {
    /// Report for a batch that ran; item failures do not clear `success`.
    pub fn completed(data: Vec<ItemResult>) -> Self {
        let done = data.iter().filter(|r| r.is_done()).count();
        let message = format!(
            "processed {} image(s): {done} succeeded, {} failed",
            data.len(),
            data.len() - done
        );
        Self {
            success: true,
            message,
            data,
        }
    }

    /// Report for a batch that never dispatched.
    pub fn aborted(err: &MockupError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            data: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.data.iter().filter(|r| r.is_done()).count()
    }

    pub fn failed(&self) -> usize {
        self.data.len() - self.succeeded()
    }
}

/// Runs batches against one configuration and a pair of collaborators.
pub struct BatchRunner {
    config: MockupConfig,
    source: Arc<dyn SwatchSource>,
    publisher: Arc<dyn Publisher>,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    pub fn new(
        config: MockupConfig,
        source: Arc<dyn SwatchSource>,
        publisher: Arc<dyn Publisher>,
    ) -> MockupResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            publisher,
        })
    }

    /// Runner fetching over HTTP with the configured timeout.
    pub fn with_http(config: MockupConfig, publisher: Arc<dyn Publisher>) -> MockupResult<Self> {
        let source = Arc::new(HttpSource::from_config(&config)?);
        Self::new(config, source, publisher)
    }

    pub fn config(&self) -> &MockupConfig {
        &self.config
    }

    /// Load the template pair and bring the derived maps up to date.
    pub fn prepare(&self) -> MockupResult<(TemplateSet, DerivedMaps)> {
        let set = TemplateSet::load(&self.config.template_path, &self.config.mask_path)?;
        let maps = MapStore::new(self.config.maps.clone())
            .ensure(&set, MapParams::from_config(&self.config))?;
        Ok((set, maps))
    }

    /// Process every URL and collect results in completion order.
    pub fn process_batch(&self, urls: &[String]) -> MockupResult<BatchReport> {
        let mut data = Vec::with_capacity(urls.len());
        self.process_batch_with(urls, |r| data.push(r.clone()))?;
        Ok(BatchReport::completed(data))
    }

    /// Like [`process_batch`](Self::process_batch), handing each result to
    /// `on_item` as soon as its item finishes.
    ///
    /// Fails before any item is dispatched if the maps cannot be produced.
    #[tracing::instrument(skip_all, fields(items = urls.len()))]
    pub fn process_batch_with(
        &self,
        urls: &[String],
        mut on_item: impl FnMut(&ItemResult),
    ) -> MockupResult<()> {
        let (set, maps) = self.prepare()?;
        let pool = build_thread_pool(self.config.workers)?;
        let workers = pool.current_num_threads();
        tracing::info!(items = urls.len(), workers, "batch started");

        let compositor = Compositor::new(&set, &maps, CompositeOptions::from_config(&self.config));
        let (tx, rx) = crossbeam_channel::unbounded::<ItemResult>();
        let mut done = 0usize;
        let mut failed = 0usize;

        pool.in_place_scope(|scope| {
            for (index, url) in urls.iter().enumerate() {
                tracing::debug!(index, url = %url, stage = ?ItemStage::Queued, "item queued");
                let tx = tx.clone();
                let compositor = &compositor;
                scope.spawn(move |_| {
                    let result = self.run_item(compositor, index, url);
                    let _ = tx.send(result);
                });
            }
            drop(tx);

            for result in rx.iter() {
                if result.is_done() {
                    done += 1;
                } else {
                    failed += 1;
                }
                on_item(&result);
            }
        });

        tracing::info!(done, failed, "batch finished");
        Ok(())
    }

    fn run_item(&self, compositor: &Compositor<'_>, index: usize, url: &str) -> ItemResult {
        let mut stage = ItemStage::Fetching;
        let outcome = match self.try_item(compositor, index, url, &mut stage) {
            Ok(published) => {
                tracing::info!(index, url, published = %published, "item done");
                ItemOutcome::Done { url: published }
            }
            Err(err) => {
                tracing::warn!(index, url, stage = ?stage, error = %err, "item failed");
                ItemOutcome::Failed {
                    stage,
                    message: err.to_string(),
                }
            }
        };
        ItemResult {
            index,
            source_url: url.to_owned(),
            outcome,
        }
    }

    fn try_item(
        &self,
        compositor: &Compositor<'_>,
        index: usize,
        url: &str,
        stage: &mut ItemStage,
    ) -> MockupResult<String> {
        let mut enter = |next: ItemStage| {
            *stage = next;
            tracing::debug!(index, url, stage = ?next, "item stage");
        };

        enter(ItemStage::Fetching);
        let bytes = self.source.fetch(url)?;

        enter(ItemStage::Normalizing);
        let normalized = normalize(
            compositor.canvas_size(),
            &bytes,
            NormalizeOptions::from_config(&self.config),
        )?;
        let dir = self.item_dir(index, url);
        normalized.write_jpeg(&dir.join("normalized.jpg"), self.config.jpeg_quality)?;

        enter(ItemStage::Compositing);
        let mockup = compositor.composite(&normalized)?;
        if self.config.keep_intermediates {
            let path = dir.join("mockup.png");
            std::fs::write(&path, &mockup.png).map_err(|e| {
                MockupError::Other(anyhow::anyhow!("write '{}': {e}", path.display()))
            })?;
        }

        enter(ItemStage::Publishing);
        self.publisher.publish(&mockup.png)
    }

    /// Per-item artifact directory under the configured output dir.
    pub fn item_dir(&self, index: usize, url: &str) -> PathBuf {
        self.config.output_dir.join(artifact_dir_name(index, url))
    }
}

/// `<index>-<stem>` with the stem taken from the URL's file name.
///
/// The index keeps duplicate file names in one batch from sharing a directory.
pub fn artifact_dir_name(index: usize, url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    let mut clean: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    if clean.is_empty() {
        clean = "swatch".to_owned();
    }
    format!("{index:03}-{clean}")
}

fn build_thread_pool(threads: Option<usize>) -> MockupResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(MockupError::config("workers must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("mockup-worker-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| MockupError::config(format!("failed to build worker pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/batch/orchestrator.rs"]
mod tests;
