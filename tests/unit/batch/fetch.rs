use std::io::Cursor;
use std::path::PathBuf;

use tiny_http::{Header, Response, Server};

use super::*;

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(3, 2, image::Rgb([40, 80, 120]));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

/// Serve `/ok.png`, `/page.html` and 404 for everything else on an ephemeral port.
fn serve() -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let png = png_bytes();
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let response = match request.url() {
                "/ok.png" => Response::from_data(png.clone())
                    .with_header("Content-Type: image/png".parse::<Header>().unwrap()),
                "/page.html" => Response::from_data(b"<html></html>".to_vec())
                    .with_header("Content-Type: text/html".parse::<Header>().unwrap()),
                _ => Response::from_data(b"Not Found".to_vec()).with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });
    format!("http://{addr}")
}

fn temp_dir(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "mockup_fetch_{tag}_{}_{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn source() -> HttpSource {
    HttpSource::new(Duration::from_secs(5)).unwrap()
}

#[test]
fn http_image_is_fetched_with_its_content_type() {
    let base = serve();
    let url = format!("{base}/ok.png");
    let got = source().fetch(&url).unwrap();
    assert_eq!(got.source, url);
    assert_eq!(got.content_type.as_deref(), Some("image/png"));
    assert_eq!(got.bytes, png_bytes());
}

#[test]
fn http_error_status_is_a_fetch_error() {
    let base = serve();
    let err = source().fetch(&format!("{base}/missing.png")).unwrap_err();
    assert!(matches!(err, MockupError::Fetch { .. }));
    assert!(err.to_string().contains("404"), "{err}");
}

#[test]
fn non_image_response_is_rejected_before_decoding() {
    let base = serve();
    let err = source().fetch(&format!("{base}/page.html")).unwrap_err();
    assert!(matches!(err, MockupError::Fetch { .. }));
    assert!(err.to_string().contains("text/html"), "{err}");
}

#[test]
fn file_urls_read_from_disk() {
    let dir = temp_dir("file");
    let path = dir.join("swatch.png");
    std::fs::write(&path, png_bytes()).unwrap();

    let url = format!("file://{}", path.display());
    let got = source().fetch(&url).unwrap();
    assert_eq!(got.content_type.as_deref(), Some("image/png"));
    assert_eq!(got.bytes.len(), png_bytes().len());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn file_urls_need_an_image_extension() {
    let dir = temp_dir("ext");
    let path = dir.join("notes.txt");
    std::fs::write(&path, b"hello").unwrap();
    let err = source()
        .fetch(&format!("file://{}", path.display()))
        .unwrap_err();
    assert!(matches!(err, MockupError::Fetch { .. }));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_scheme_is_rejected() {
    let err = source().fetch("ftp://example.com/a.png").unwrap_err();
    assert!(matches!(err, MockupError::Fetch { .. }));
}
