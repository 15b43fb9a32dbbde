//! End-to-end tests for the HTTP surface of edgequake-pdf2img.
//!
//! Most tests drive the full router with `tower::ServiceExt::oneshot` against
//! a stub PDF engine, so they run anywhere. Tests that bind the real pdfium
//! library are gated behind the `E2E_ENABLED` environment variable.
//!
//! Run the pdfium-backed tests with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use edgequake_pdf2img::config::{OutputFormat, PageNumberPlacement, MB};
use edgequake_pdf2img::engine::pdfium::PdfiumHandle;
use edgequake_pdf2img::pipeline::encode::write_image;
use edgequake_pdf2img::{
    create_router, AppState, EngineHandle, EngineQueue, Pdf2ImgError, ServerConfig,
    SourceDocument,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

// ── Stub engine ──────────────────────────────────────────────────────────────

type Overlays = Arc<Mutex<Vec<(usize, PageNumberPlacement, String)>>>;

/// Renders `pages` solid-colour pages; fails to load documents containing
/// the marker `BROKEN`.
struct StubEngine {
    pages: usize,
    overlays: Overlays,
}

struct StubDocument<'a> {
    engine: &'a StubEngine,
    current: usize,
    format: OutputFormat,
}

impl EngineHandle for StubEngine {
    type Document<'a> = StubDocument<'a>;

    fn load_document<'a>(&'a self, path: &Path) -> Result<StubDocument<'a>, Pdf2ImgError> {
        let bytes = std::fs::read(path).map_err(|e| Pdf2ImgError::CorruptPdf {
            file_name: path.display().to_string(),
            detail: e.to_string(),
        })?;
        if bytes.windows(6).any(|w| w == b"BROKEN") {
            return Err(Pdf2ImgError::CorruptPdf {
                file_name: path.display().to_string(),
                detail: "cross-reference table missing".into(),
            });
        }
        Ok(StubDocument {
            engine: self,
            current: 0,
            format: OutputFormat::WebP,
        })
    }
}

impl SourceDocument for StubDocument<'_> {
    fn page_count(&self) -> usize {
        self.engine.pages
    }

    fn select_page(&mut self, index: usize) -> bool {
        self.current = index;
        index < self.engine.pages
    }

    fn set_output_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    fn draw_text_overlay(
        &mut self,
        placement: PageNumberPlacement,
        text: &str,
    ) -> Result<(), Pdf2ImgError> {
        self.engine
            .overlays
            .lock()
            .unwrap()
            .push((self.current, placement, text.to_string()));
        Ok(())
    }

    fn write_current_page(&mut self, path: &Path) -> Result<(), Pdf2ImgError> {
        let shade = (self.current * 50 % 256) as u8;
        let page = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 30, Rgb([shade, 10, 200])));
        write_image(&page, self.format, 85, path).map(|_| ())
    }
}

// ── Test helpers ─────────────────────────────────────────────────────────────

struct TestServer {
    app: Router,
    overlays: Overlays,
    root: tempfile::TempDir,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("edgequake_pdf2img=debug")
        .with_test_writer()
        .try_init();
}

fn server_with(pages: usize, configure: impl FnOnce(&Path) -> ServerConfig) -> TestServer {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let overlays = Overlays::default();
    let engine_overlays = Arc::clone(&overlays);
    let engine = EngineQueue::start(move || {
        Ok(StubEngine {
            pages,
            overlays: engine_overlays,
        })
    })
    .unwrap();
    let config = configure(&root.path().join("work"));
    TestServer {
        app: create_router(AppState::new(engine, config)),
        overlays,
        root,
    }
}

fn server(pages: usize) -> TestServer {
    server_with(pages, |root| {
        ServerConfig::builder().workspace_root(root).build().unwrap()
    })
}

impl TestServer {
    /// True when no request left anything behind in the workspace root.
    fn workspace_root_is_clean(&self) -> bool {
        std::fs::read_dir(self.root.path().join("work"))
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

const BOUNDARY: &str = "pdf2img-test-boundary";

fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn png(seed: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([seed, seed, seed])))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

const FAKE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj << >> endobj\n%%EOF\n";

fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
    (0..zip.len())
        .map(|i| {
            let mut entry = zip.by_index(i).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            (entry.name().to_string(), data)
        })
        .collect()
}

async fn error_message(response: axum::response::Response) -> String {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).expect("JSON error body");
    json["error"].as_str().unwrap_or_default().to_string()
}

// ── PDF endpoint ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pdf_upload_returns_one_entry_per_page() {
    let srv = server(3);
    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload",
            &[
                Part::Text("select", "png"),
                Part::File("file", "quarterly report.pdf", FAKE_PDF),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"images.zip\""
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let entries = zip_entries(&body);
    let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        [
            "1_quarterly report.png",
            "2_quarterly report.png",
            "3_quarterly report.png"
        ]
    );
    for (name, data) in &entries {
        assert_eq!(
            image::guess_format(data).unwrap(),
            ImageFormat::Png,
            "{name}"
        );
    }
    assert!(srv.overlays.lock().unwrap().is_empty());
    assert!(srv.workspace_root_is_clean());
}

#[tokio::test]
async fn test_page_numbers_are_drawn_bottom_right() {
    let srv = server(2);
    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload",
            &[
                Part::Text("select", "jpeg"),
                Part::Text("page-number", "bottom-right"),
                Part::File("file", "deck.pdf", FAKE_PDF),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    let names: Vec<_> = zip_entries(&body).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["1_deck.jpeg", "2_deck.jpeg"]);
    assert_eq!(
        *srv.overlays.lock().unwrap(),
        [
            (0, PageNumberPlacement::BottomRight, " 1 / 2 ".to_string()),
            (1, PageNumberPlacement::BottomRight, " 2 / 2 ".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_entry_names_never_contain_directories() {
    let srv = server(1);
    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload",
            &[
                Part::Text("select", "webp"),
                Part::File("file", "../../etc/evil.pdf", FAKE_PDF),
            ],
        ))
        .await
        .unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let names: Vec<_> = zip_entries(&body).into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["1_evil.webp"]);
}

#[tokio::test]
async fn test_unknown_output_format_is_rejected() {
    let srv = server(2);
    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload",
            &[
                Part::Text("select", "tiff"),
                Part::File("file", "deck.pdf", FAKE_PDF),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("tiff"));
    assert!(srv.workspace_root_is_clean());
}

#[tokio::test]
async fn test_unknown_placement_is_rejected() {
    let srv = server(2);
    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload",
            &[
                Part::Text("select", "png"),
                Part::Text("page-number", "top-left"),
                Part::File("file", "deck.pdf", FAKE_PDF),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_pdf_is_a_bad_request() {
    let srv = server(2);
    let response = srv
        .app
        .clone()
        .oneshot(multipart_request("/upload", &[Part::Text("select", "png")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(error_message(response).await.contains("file"));
}

#[tokio::test]
async fn test_non_pdf_upload_is_unsupported_media() {
    let srv = server(2);
    let image = png(1);
    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload",
            &[
                Part::Text("select", "png"),
                Part::File("file", "scan.pdf", &image),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(error_message(response).await.contains("scan.pdf"));
}

#[tokio::test]
async fn test_unreadable_pdf_fails_before_streaming() {
    let srv = server(2);
    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload",
            &[
                Part::Text("select", "png"),
                Part::File("file", "torn.pdf", b"%PDF-1.7\nBROKEN"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(error_message(response).await.contains("torn.pdf"));
    assert!(srv.workspace_root_is_clean());
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let srv = server_with(1, |root| {
        ServerConfig::builder()
            .workspace_root(root)
            .max_pdf_upload_bytes(2_000)
            .build()
            .unwrap()
    });
    let mut big = FAKE_PDF.to_vec();
    big.resize(10_000, b' ');

    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload",
            &[
                Part::Text("select", "png"),
                Part::File("file", "big.pdf", &big),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(srv.workspace_root_is_clean());
}

#[tokio::test]
async fn test_get_is_method_not_allowed() {
    let srv = server(1);
    for uri in ["/upload", "/upload-multi"] {
        let response = srv
            .app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{uri}");
        assert_eq!(response.headers()[header::ALLOW], "POST");
    }
}

#[tokio::test]
async fn test_non_multipart_body_is_a_bad_request() {
    let srv = server(1);
    let response = srv
        .app
        .clone()
        .oneshot(
            Request::post("/upload")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ── Image endpoint ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_image_batch_preserves_stems_and_order() {
    let srv = server(0);
    let (a, b, c) = (png(10), png(20), png(30));
    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload-multi",
            &[
                Part::File("files", "zebra.png", &a),
                Part::File("files", "apple.png", &b),
                Part::File("other", "zebra.png", &c),
                Part::Text("select", "webp"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let entries = zip_entries(&body);
    let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["zebra.webp", "apple.webp", "zebra-2.webp"]);
    for (_, data) in &entries {
        assert_eq!(image::guess_format(data).unwrap(), ImageFormat::WebP);
    }
    assert!(srv.workspace_root_is_clean());
}

#[tokio::test]
async fn test_one_non_image_fails_the_whole_batch() {
    let srv = server(0);
    let good = png(1);
    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload-multi",
            &[
                Part::Text("select", "png"),
                Part::File("files", "good.png", &good),
                Part::File("files", "notes.txt", b"not an image"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert!(error_message(response).await.contains("notes.txt"));
    assert!(srv.workspace_root_is_clean());
}

#[tokio::test]
async fn test_empty_batch_is_a_bad_request() {
    let srv = server(0);
    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload-multi",
            &[Part::Text("select", "png"), Part::File("files", "", b"")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_image_limit_is_separate_from_pdf_limit() {
    let srv = server_with(0, |root| {
        ServerConfig::builder()
            .workspace_root(root)
            .max_pdf_upload_bytes(1_000)
            .max_image_upload_bytes(MB)
            .build()
            .unwrap()
    });
    let image = png(5);
    let mut padded = image.clone();
    padded.resize(5_000, 0);

    let response = srv
        .app
        .clone()
        .oneshot(multipart_request(
            "/upload-multi",
            &[
                Part::Text("select", "jpeg"),
                Part::File("files", "padded.png", &padded),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(zip_entries(&body).len(), 1);
}

// ── Slow and vanishing clients ───────────────────────────────────────────────

/// Many pages behind a small pipe, so a response that is not read stalls
/// its archive pump after the first few entries.
fn slow_client_server() -> TestServer {
    server_with(200, |root| {
        ServerConfig::builder()
            .workspace_root(root)
            .stream_buffer_bytes(1024)
            .request_timeout_secs(3)
            .build()
            .unwrap()
    })
}

fn pdf_upload(file_name: &str) -> Request<Body> {
    multipart_request(
        "/upload",
        &[
            Part::Text("select", "png"),
            Part::File("file", file_name, FAKE_PDF),
        ],
    )
}

#[tokio::test]
async fn test_unread_download_does_not_block_other_pdfs() {
    let srv = slow_client_server();

    let stalled = srv.app.clone().oneshot(pdf_upload("big.pdf")).await.unwrap();
    assert_eq!(stalled.status(), StatusCode::OK);

    // The engine must be free again while the first body sits unread.
    let second = srv.app.clone().oneshot(pdf_upload("next.pdf")).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let body = to_bytes(second.into_body(), usize::MAX).await.unwrap();
    let entries = zip_entries(&body);
    assert_eq!(entries.len(), 200);
    assert_eq!(entries[0].0, "1_next.png");

    drop(stalled);
}

#[tokio::test]
async fn test_client_disconnect_removes_workspace() {
    let srv = slow_client_server();

    let response = srv.app.clone().oneshot(pdf_upload("big.pdf")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!srv.workspace_root_is_clean());

    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.expect("first chunk").unwrap();
    assert!(first.starts_with(b"PK"));
    drop(body);

    let mut clean = false;
    for _ in 0..100 {
        if srv.workspace_root_is_clean() {
            clean = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(clean, "workspace left behind after the client went away");
}

// ── Health ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let srv = server(0);
    let response = srv
        .app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

// ── Real pdfium (gated) ──────────────────────────────────────────────────────

/// A valid PDF with `pages` empty 200×200 pt pages.
fn minimal_pdf(pages: usize) -> Vec<u8> {
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            (0..pages)
                .map(|i| format!("{} 0 R", i + 3))
                .collect::<Vec<_>>()
                .join(" "),
            pages
        ),
    ];
    for _ in 0..pages {
        objects.push(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 200] /Resources << >> >>".into(),
        );
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, obj) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, obj).as_bytes());
    }
    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for off in offsets {
        pdf.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    pdf
}

#[tokio::test(flavor = "multi_thread")]
async fn test_real_pdfium_renders_numbered_pages() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let config = ServerConfig::builder()
        .workspace_root(root.path())
        .dpi(72)
        .build()
        .unwrap();
    let library = std::env::var_os("PDFIUM_LIB_PATH").map(Into::into);
    let settings = config.render_settings();
    let engine = EngineQueue::start(move || PdfiumHandle::bind(library, settings))
        .expect("pdfium must be available when E2E_ENABLED is set");
    let app = create_router(AppState::new(engine, config));

    let pdf = minimal_pdf(2);
    let response = app
        .oneshot(multipart_request(
            "/upload",
            &[
                Part::Text("select", "webp"),
                Part::Text("page-number", "bottom-center"),
                Part::File("file", "blank.pdf", &pdf),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let entries = zip_entries(&body);
    let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["1_blank.webp", "2_blank.webp"]);
    for (_, data) in &entries {
        let page = image::load_from_memory(data).unwrap();
        assert_eq!((page.width(), page.height()), (200, 200));
    }
    assert!(std::fs::read_dir(root.path()).unwrap().next().is_none());
}
