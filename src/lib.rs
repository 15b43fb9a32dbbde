//! # edgequake-pdf2img
//!
//! An HTTP service that turns a PDF, or a batch of images, into WebP, PNG or
//! JPEG files and streams them back as a single ZIP archive.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Intake     body limit, `select` / `page-number` / file fields
//!  ├─ 2. Sniff      magic bytes decide PDF vs. image, never the filename
//!  ├─ 3. Workspace  per-request UUID scratch dir, removed on every path
//!  ├─ 4. Convert    pdfium (engine thread) or image crate (blocking pool),
//!  │                one page/image at a time, optional " i / N " overlay
//!  ├─ 5. Archive    each unit appended as a ZIP entry while it is produced
//!  └─ 6. Response   application/zip, attachment "images.zip"
//! ```
//!
//! Converted units wait on disk until the archive takes them, and memory
//! holds at most one unit plus the response pipe, so a 500-page PDF streams
//! in constant memory. The PDF engine never waits on a client's download.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2img::engine::pdfium::PdfiumHandle;
//! use edgequake_pdf2img::engine::EngineQueue;
//! use edgequake_pdf2img::server::{self, AppState};
//! use edgequake_pdf2img::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let settings = config.render_settings();
//!     let engine = EngineQueue::start(move || PdfiumHandle::bind(None, settings))?;
//!     let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
//!     server::serve(listener, AppState::new(engine, config)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2img` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when embedding the router in another service:
//! ```toml
//! edgequake-pdf2img = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod server;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OutputFormat, PageNumberPlacement, RenderSettings, ServerConfig, ServerConfigBuilder};
pub use convert::convert;
pub use engine::{EngineHandle, EngineQueue, SourceDocument};
pub use error::{ErrorClass, Pdf2ImgError};
pub use pipeline::intake::ConversionRequest;
pub use progress::{
    ConversionProgressCallback, NoopProgressCallback, ProgressCallback, TracingProgressCallback,
};
pub use server::{create_router, AppState};
pub use stream::ArchiveByteStream;
