//! Server binary for edgequake-pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ServerConfig`, binds PDFium once, and serves HTTP until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2img::config::MB;
use edgequake_pdf2img::engine::pdfium::PdfiumHandle;
use edgequake_pdf2img::engine::EngineQueue;
use edgequake_pdf2img::server::{self, AppState};
use edgequake_pdf2img::{ServerConfig, TracingProgressCallback};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port with pdfium from the system library path
  pdf2img

  # Explicit pdfium library and a larger PDF limit
  PDFIUM_LIB_PATH=/opt/pdfium/lib/libpdfium.so pdf2img --max-pdf-mb 50

  # Convert a PDF to WebP pages with page numbers at the bottom right
  curl -F file=@deck.pdf -F select=webp -F page-number=bottom-right \
       http://localhost:8080/upload -o images.zip

  # Convert a batch of images to JPEG
  curl -F a=@one.png -F b=@two.gif -F select=jpeg \
       http://localhost:8080/upload-multi -o images.zip

FORM FIELDS:
  select        webp | png | jpeg                       (required)
  page-number   none | bottom-center | bottom-right | bottom-left
                                                       (PDF endpoint, default none)
  file          the PDF                                 (PDF endpoint)
  <any>         one or more images                      (image endpoint)

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to the pdfium shared library
  RUST_LOG          Log filter (overrides --verbose/--quiet)
"#;

/// Convert PDF pages and image batches to WebP/PNG/JPEG over HTTP.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Convert PDF pages and image batches to WebP/PNG/JPEG, streamed back as a ZIP",
    after_help = AFTER_HELP
)]
struct Cli {
    /// Address to listen on.
    #[arg(long, env = "PDF2IMG_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Upload limit of the PDF endpoint, in MB.
    #[arg(long, env = "PDF2IMG_MAX_PDF_MB", default_value_t = 30)]
    max_pdf_mb: u64,

    /// Upload limit of the image endpoint, in MB.
    #[arg(long, env = "PDF2IMG_MAX_IMAGES_MB", default_value_t = 100)]
    max_images_mb: u64,

    /// Directory under which per-request workspaces are created.
    #[arg(long, env = "PDF2IMG_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Rendering DPI for PDF pages (72–400).
    #[arg(long, env = "PDF2IMG_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Cap on either rendered page dimension, in pixels.
    #[arg(long, env = "PDF2IMG_MAX_PIXELS", default_value_t = 4000)]
    max_pixels: u32,

    /// JPEG quality (1–100).
    #[arg(long, env = "PDF2IMG_JPEG_QUALITY", default_value_t = 92,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Page-number font size, in points.
    #[arg(long, env = "PDF2IMG_PAGE_NUMBER_SIZE", default_value_t = 12.0)]
    page_number_size: f32,

    /// Seconds allowed until the response starts.
    #[arg(long, env = "PDF2IMG_REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// Path to the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "PDF2IMG_LOG_JSON")]
    log_json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, env = "PDF2IMG_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init();
    }

    // ── Configuration ────────────────────────────────────────────────────
    let mut builder = ServerConfig::builder()
        .listen_addr(cli.listen)
        .max_pdf_upload_bytes(cli.max_pdf_mb.saturating_mul(MB))
        .max_image_upload_bytes(cli.max_images_mb.saturating_mul(MB))
        .dpi(cli.dpi)
        .max_rendered_pixels(cli.max_pixels)
        .jpeg_quality(cli.jpeg_quality)
        .page_number_font_size(cli.page_number_size)
        .request_timeout_secs(cli.request_timeout)
        .progress_callback(Arc::new(TracingProgressCallback));
    if let Some(root) = cli.workspace_root {
        builder = builder.workspace_root(root);
    }
    if let Some(lib) = cli.pdfium_lib {
        builder = builder.pdfium_library(lib);
    }
    let config = builder.build().context("Invalid configuration")?;
    info!(?config, "Starting pdf2img");

    // ── PDF engine ───────────────────────────────────────────────────────
    // Bound once for the process lifetime; a missing library is fatal here
    // rather than on the first upload.
    let library = config.pdfium_library.clone();
    let settings = config.render_settings();
    let engine = tokio::task::block_in_place(|| {
        EngineQueue::start(move || PdfiumHandle::bind(library, settings))
    })
    .context("Failed to start the PDF engine")?;

    // ── Serve ────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    server::serve(listener, AppState::new(engine, config))
        .await
        .context("HTTP server failed")?;
    Ok(())
}
