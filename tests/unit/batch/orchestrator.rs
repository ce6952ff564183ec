use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{GrayImage, Luma, Rgba, RgbaImage};

use super::*;
use crate::assets::decode::SwatchBytes;
use crate::batch::publish::MemoryPublisher;
use crate::config::MapPaths;

fn temp_dir(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "mockup_batch_{tag}_{}_{nanos}",
        std::process::id()
    ))
}

fn write_pair(dir: &Path, mask_size: (u32, u32)) {
    std::fs::create_dir_all(dir).unwrap();
    RgbaImage::from_fn(40, 60, |x, y| Rgba([120 + (x % 7) as u8, 110 + (y % 5) as u8, 100, 255]))
        .save(dir.join("template.png"))
        .unwrap();
    GrayImage::from_pixel(mask_size.0, mask_size.1, Luma([255]))
        .save(dir.join("mask.png"))
        .unwrap();
}

fn config_in(dir: &Path) -> MockupConfig {
    MockupConfig {
        template_path: dir.join("template.png"),
        mask_path: dir.join("mask.png"),
        maps: MapPaths {
            dir: dir.join("maps"),
            ..MapPaths::default()
        },
        output_dir: dir.join("out"),
        output_width: 40,
        swatch_width: 20,
        bottom_padding: 10,
        workers: Some(2),
        ..MockupConfig::default()
    }
}

fn png(rgb: [u8; 3]) -> Vec<u8> {
    let mut out = Vec::new();
    image::RgbImage::from_pixel(16, 12, image::Rgb(rgb))
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

#[derive(Default)]
struct FakeSource {
    items: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.items.insert(url.to_owned(), bytes);
        self
    }
}

impl SwatchSource for FakeSource {
    fn fetch(&self, url: &str) -> MockupResult<SwatchBytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.items.get(url) {
            Some(bytes) => Ok(SwatchBytes::new(url, Some("image/png".into()), bytes.clone())),
            None => Err(MockupError::fetch(url, "HTTP status 404 Not Found")),
        }
    }
}

struct RejectingPublisher;

impl Publisher for RejectingPublisher {
    fn publish(&self, _png: &[u8]) -> MockupResult<String> {
        Err(MockupError::publish("bucket is read-only"))
    }
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn artifact_dir_names_follow_source_file_names() {
    assert_eq!(artifact_dir_name(7, "http://h/a/b/swatch.png"), "007-swatch");
    assert_eq!(
        artifact_dir_name(3, "https://cdn/x/Red Shirt.v2.jpg?size=large#top"),
        "003-Red_Shirt_v2"
    );
    assert_eq!(artifact_dir_name(1, "http://h/dir/"), "001-dir");
    assert_eq!(artifact_dir_name(12, ""), "012-swatch");
}

#[test]
fn failing_item_does_not_affect_siblings() {
    let dir = temp_dir("isolation");
    write_pair(&dir, (40, 60));
    let source = FakeSource::default()
        .with("http://h/a.png", png([255, 0, 0]))
        .with("http://h/c.png", png([0, 0, 255]));
    let publisher = Arc::new(MemoryPublisher::new());
    let runner = BatchRunner::new(config_in(&dir), Arc::new(source), publisher.clone()).unwrap();

    let report = runner
        .process_batch(&urls(&["http://h/a.png", "http://h/b.png", "http://h/c.png"]))
        .unwrap();

    assert!(report.success);
    assert_eq!(report.data.len(), 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(publisher.len(), 2);

    let failed: Vec<_> = report.data.iter().filter(|r| !r.is_done()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].index, 1);
    assert_eq!(failed[0].source_url, "http://h/b.png");
    assert_eq!(failed[0].final_stage(), ItemStage::Failed);
    assert!(matches!(
        failed[0].outcome,
        ItemOutcome::Failed {
            stage: ItemStage::Fetching,
            ..
        }
    ));

    assert!(runner.item_dir(0, "http://h/a.png").join("normalized.jpg").is_file());
    assert!(runner.item_dir(2, "http://h/c.png").join("normalized.jpg").is_file());
    assert!(!runner.item_dir(1, "http://h/b.png").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn undecodable_bytes_fail_while_normalizing() {
    let dir = temp_dir("decode");
    write_pair(&dir, (40, 60));
    let source = FakeSource::default().with("http://h/junk.png", b"definitely not a png".to_vec());
    let runner = BatchRunner::new(
        config_in(&dir),
        Arc::new(source),
        Arc::new(MemoryPublisher::new()),
    )
    .unwrap();

    let report = runner.process_batch(&urls(&["http://h/junk.png"])).unwrap();
    match &report.data[0].outcome {
        ItemOutcome::Failed { stage, message } => {
            assert_eq!(*stage, ItemStage::Normalizing);
            assert!(message.starts_with("decode error"), "{message}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn publish_failure_is_item_scoped() {
    let dir = temp_dir("publish");
    write_pair(&dir, (40, 60));
    let source = FakeSource::default().with("http://h/a.png", png([10, 20, 30]));
    let runner =
        BatchRunner::new(config_in(&dir), Arc::new(source), Arc::new(RejectingPublisher)).unwrap();

    let report = runner.process_batch(&urls(&["http://h/a.png"])).unwrap();
    assert!(report.success);
    assert!(matches!(
        report.data[0].outcome,
        ItemOutcome::Failed {
            stage: ItemStage::Publishing,
            ..
        }
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn map_failure_aborts_before_any_fetch() {
    let dir = temp_dir("fatal");
    write_pair(&dir, (20, 20));
    let source = Arc::new(FakeSource::default().with("http://h/a.png", png([1, 2, 3])));
    let publisher = Arc::new(MemoryPublisher::new());
    let runner = BatchRunner::new(config_in(&dir), source.clone(), publisher.clone()).unwrap();

    let err = runner.process_batch(&urls(&["http://h/a.png"])).unwrap_err();
    assert!(matches!(err, MockupError::MapGeneration(_)));
    assert!(err.is_batch_fatal());
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    assert!(publisher.is_empty());

    let report = BatchReport::aborted(&err);
    assert!(!report.success);
    assert!(report.data.is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn results_stream_to_the_callback() {
    let dir = temp_dir("stream");
    write_pair(&dir, (40, 60));
    let source = FakeSource::default()
        .with("http://h/a.png", png([200, 10, 10]))
        .with("http://h/b.png", png([10, 200, 10]));
    let runner = BatchRunner::new(
        config_in(&dir),
        Arc::new(source),
        Arc::new(MemoryPublisher::new()),
    )
    .unwrap();

    let mut seen = Vec::new();
    runner
        .process_batch_with(&urls(&["http://h/a.png", "http://h/b.png"]), |r| {
            seen.push(r.index)
        })
        .unwrap();
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn results_serialize_with_status_tag() {
    let done = ItemResult {
        index: 0,
        source_url: "http://h/a.png".into(),
        outcome: ItemOutcome::Done {
            url: "memory://mockup_x.png".into(),
        },
    };
    assert_eq!(
        serde_json::to_value(&done).unwrap(),
        serde_json::json!({
            "index": 0,
            "source_url": "http://h/a.png",
            "status": "done",
            "url": "memory://mockup_x.png",
        })
    );

    let failed = ItemResult {
        index: 1,
        source_url: "http://h/b.png".into(),
        outcome: ItemOutcome::Failed {
            stage: ItemStage::Fetching,
            message: "fetch error: http://h/b.png: HTTP status 404 Not Found".into(),
        },
    };
    let v = serde_json::to_value(&failed).unwrap();
    assert_eq!(v["status"], "failed");
    assert_eq!(v["stage"], "fetching");
    assert!(v.get("url").is_none());
}

#[test]
fn report_summarizes_counts() {
    let report = BatchReport::completed(vec![
        ItemResult {
            index: 0,
            source_url: "a".into(),
            outcome: ItemOutcome::Done { url: "u".into() },
        },
        ItemResult {
            index: 1,
            source_url: "b".into(),
            outcome: ItemOutcome::Failed {
                stage: ItemStage::Compositing,
                message: "boom".into(),
            },
        },
    ]);
    assert!(report.success);
    assert_eq!(report.message, "processed 2 image(s): 1 succeeded, 1 failed");
    assert_eq!((report.succeeded(), report.failed()), (1, 1));
}

#[test]
fn zero_workers_is_rejected_up_front() {
    let cfg = MockupConfig {
        workers: Some(0),
        ..MockupConfig::default()
    };
    let err = BatchRunner::new(
        cfg,
        Arc::new(FakeSource::default()),
        Arc::new(MemoryPublisher::new()),
    )
    .unwrap_err();
    assert!(matches!(err, MockupError::Config(_)));
}

#[test]
fn worker_pool_honors_explicit_count() {
    let pool = build_thread_pool(Some(3)).unwrap();
    assert_eq!(pool.current_num_threads(), 3);

    let default = build_thread_pool(None).unwrap();
    assert!(default.current_num_threads() >= 1);

    assert!(matches!(
        build_thread_pool(Some(0)).unwrap_err(),
        MockupError::Config(_)
    ));
}
