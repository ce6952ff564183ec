use image::{GrayImage, RgbaImage};

use super::*;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "mockup_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn pair() -> TemplateSet {
    let template = RgbaImage::from_fn(6, 4, |x, y| {
        image::Rgba([(x * 40) as u8, (y * 60) as u8, 90, 255])
    });
    let mask = GrayImage::from_fn(6, 4, |x, _| image::Luma([if x > 1 { 255 } else { 0 }]));
    TemplateSet::from_images(template, mask)
}

fn store_in(dir: &Path, reuse_cached: bool) -> MapStore {
    MapStore::new(MapPaths {
        dir: dir.to_path_buf(),
        reuse_cached,
        ..MapPaths::default()
    })
}

#[test]
fn ensure_writes_all_maps_and_key() {
    let dir = temp_dir("store_writes");
    let store = store_in(&dir, false);
    let maps = store.ensure(&pair(), MapParams::default()).unwrap();

    assert!(store.paths().displacement_path().is_file());
    assert!(store.paths().lighting_path().is_file());
    assert!(store.paths().adjustment_path().is_file());
    assert_eq!(
        store.cached_key().unwrap(),
        cache_key(&pair(), MapParams::default())
    );

    let loaded = store.load(maps.size()).unwrap();
    assert_eq!(loaded, maps);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reuse_skips_regeneration_when_key_matches() {
    let dir = temp_dir("store_reuse");
    let store = store_in(&dir, true);
    let first = store.ensure(&pair(), MapParams::default()).unwrap();

    // Tamper with a cached map; a matching key means the cached copy wins.
    let mut marked = first.lighting.clone();
    marked.put_pixel(0, 0, image::Luma([200]));
    marked.save(store.paths().lighting_path()).unwrap();

    let second = store.ensure(&pair(), MapParams::default()).unwrap();
    assert_eq!(second.lighting.get_pixel(0, 0).0[0], 200);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn refresh_policy_overwrites_previous_output() {
    let dir = temp_dir("store_refresh");
    let store = store_in(&dir, false);
    let first = store.ensure(&pair(), MapParams::default()).unwrap();

    let mut marked = first.lighting.clone();
    marked.put_pixel(0, 0, image::Luma([200]));
    marked.save(store.paths().lighting_path()).unwrap();

    let second = store.ensure(&pair(), MapParams::default()).unwrap();
    assert_eq!(second, first);
    assert_eq!(store.load(first.size()).unwrap(), first);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn load_rejects_wrong_size() {
    let dir = temp_dir("store_size");
    let store = store_in(&dir, false);
    store.ensure(&pair(), MapParams::default()).unwrap();
    let err = store
        .load(Size {
            width: 1,
            height: 1,
        })
        .unwrap_err();
    assert!(matches!(err, MockupError::MapGeneration(_)));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn concurrent_ensure_on_one_dir_always_succeeds() {
    let dir = temp_dir("store_concurrent");
    let store = store_in(&dir, false);
    let set = pair();
    let expected = generate_maps(&set, MapParams::default()).unwrap();

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..10 {
                    let maps = store.ensure(&set, MapParams::default()).unwrap();
                    assert_eq!(maps, expected);
                }
            });
        }
    });

    assert_eq!(store.load(set.size()).unwrap(), expected);
    let leftovers: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    std::fs::remove_dir_all(&dir).ok();
}
