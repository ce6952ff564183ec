use image::RgbaImage;

use super::*;

fn striped_pair() -> TemplateSet {
    let template = RgbaImage::from_fn(8, 6, |x, _| {
        let v = if x < 4 { 60 } else { 180 };
        image::Rgba([v, v, v, 255])
    });
    let mask = GrayImage::from_fn(8, 6, |_, y| image::Luma([if y < 3 { 255 } else { 0 }]));
    TemplateSet::from_images(template, mask)
}

#[test]
fn maps_match_template_dimensions() {
    let maps = generate_maps(&striped_pair(), MapParams::default()).unwrap();
    maps.check_size(Size {
        width: 8,
        height: 6,
    })
    .unwrap();
}

#[test]
fn generation_is_deterministic() {
    let set = striped_pair();
    let a = generate_maps(&set, MapParams::default()).unwrap();
    let b = generate_maps(&set, MapParams::default()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn outside_mask_is_neutral() {
    let maps = generate_maps(&striped_pair(), MapParams::default()).unwrap();
    assert_eq!(maps.displacement.get_pixel(0, 5).0[0], 128);
    assert_eq!(maps.lighting.get_pixel(0, 5).0[0], 128);
    assert_eq!(maps.adjustment.get_pixel(0, 5).0, [255, 255, 255]);
}

#[test]
fn inside_mask_carries_relief_and_highlights() {
    let maps = generate_maps(&striped_pair(), MapParams::default()).unwrap();
    // Normalization stretches the two stripes to the ends of the range.
    assert_eq!(maps.displacement.get_pixel(0, 0).0[0], 0);
    assert_eq!(maps.displacement.get_pixel(7, 0).0[0], 255);
    // Dark stripe is clamped to neutral, bright stripe keeps a highlight.
    assert_eq!(maps.lighting.get_pixel(0, 0).0[0], 128);
    assert_eq!(maps.lighting.get_pixel(7, 0).0[0], 255 - 77);
    // The brightest visible tone maps to white in the tint map.
    assert_eq!(maps.adjustment.get_pixel(7, 0).0, [255, 255, 255]);
    assert!(maps.adjustment.get_pixel(0, 0).0[0] < 128);
}

#[test]
fn lighting_never_drops_below_neutral() {
    let params = MapParams {
        brightness_delta: 100.0,
        ..MapParams::default()
    };
    let maps = generate_maps(&striped_pair(), params).unwrap();
    assert!(maps.lighting.pixels().all(|p| p.0[0] >= 128));
}

#[test]
fn mismatched_mask_fails() {
    let set = TemplateSet::from_images(RgbaImage::new(8, 6), GrayImage::new(6, 8));
    let err = generate_maps(&set, MapParams::default()).unwrap_err();
    assert!(matches!(err, MockupError::MapGeneration(_)), "{err}");
}

#[test]
fn cache_tag_reflects_params() {
    let a = MapParams::default().cache_tag();
    let b = MapParams {
        brightness_delta: 10.0,
        ..MapParams::default()
    }
    .cache_tag();
    assert_ne!(a, b);
}
