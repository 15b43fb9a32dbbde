//! Configuration types for the conversion server.
//!
//! All server behaviour is controlled through [`ServerConfig`], built via its
//! [`ServerConfigBuilder`]. The request-level choices a caller makes in the
//! upload form ([`OutputFormat`], [`PageNumberPlacement`]) live here too so
//! the intake, engine and naming code all agree on one vocabulary.

use crate::error::Pdf2ImgError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// One decimal megabyte, the unit the upload limits are expressed in.
pub const MB: u64 = 1000 * 1000;

/// Configuration for the conversion server.
///
/// Built via [`ServerConfig::builder()`] or using [`ServerConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2img::ServerConfig;
///
/// let config = ServerConfig::builder()
///     .dpi(200)
///     .max_pdf_upload_bytes(50 * edgequake_pdf2img::config::MB)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to. Default: `0.0.0.0:8080`.
    pub listen_addr: SocketAddr,

    /// Body limit of the PDF endpoint in bytes. Default: 30 MB.
    pub max_pdf_upload_bytes: u64,

    /// Body limit of the image-batch endpoint in bytes. Default: 100 MB.
    pub max_image_upload_bytes: u64,

    /// Directory under which per-request workspaces are created.
    /// Default: `$TMPDIR/pdf2img`.
    pub workspace_root: PathBuf,

    /// Rendering DPI used when rasterising PDF pages. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Cap on either rendered page dimension in pixels. Default: 4000.
    ///
    /// Keeps an A0 poster at high DPI from allocating a gigapixel bitmap.
    pub max_rendered_pixels: u32,

    /// JPEG encoder quality, 1–100. Default: 92.
    pub jpeg_quality: u8,

    /// Font size of the page-number overlay in PDF points. Default: 12.
    pub page_number_font_size: f32,

    /// Distance of the page-number overlay from the page edges in PDF points. Default: 10.
    pub page_number_margin: f32,

    /// Time allowed until response headers are produced, in seconds. Default: 60.
    pub request_timeout_secs: u64,

    /// Size of the in-memory pipe between the ZIP writer and the response body. Default: 64 KiB.
    pub stream_buffer_bytes: usize,

    /// Explicit path to the pdfium shared library. If None, the working
    /// directory and then the system library search path are tried.
    pub pdfium_library: Option<PathBuf>,

    /// Optional per-unit progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_pdf_upload_bytes: 30 * MB,
            max_image_upload_bytes: 100 * MB,
            workspace_root: std::env::temp_dir().join("pdf2img"),
            dpi: 150,
            max_rendered_pixels: 4000,
            jpeg_quality: 92,
            page_number_font_size: 12.0,
            page_number_margin: 10.0,
            request_timeout_secs: 60,
            stream_buffer_bytes: 64 * 1024,
            pdfium_library: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("max_pdf_upload_bytes", &self.max_pdf_upload_bytes)
            .field("max_image_upload_bytes", &self.max_image_upload_bytes)
            .field("workspace_root", &self.workspace_root)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("page_number_font_size", &self.page_number_font_size)
            .field("page_number_margin", &self.page_number_margin)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("stream_buffer_bytes", &self.stream_buffer_bytes)
            .field("pdfium_library", &self.pdfium_library)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// The request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Raster settings handed to the engines.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            dpi: self.dpi,
            max_rendered_pixels: self.max_rendered_pixels,
            jpeg_quality: self.jpeg_quality,
            page_number_font_size: self.page_number_font_size,
            page_number_margin: self.page_number_margin,
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn listen_addr(mut self, addr: SocketAddr) -> Self {
        self.config.listen_addr = addr;
        self
    }

    pub fn max_pdf_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_pdf_upload_bytes = bytes;
        self
    }

    pub fn max_image_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_image_upload_bytes = bytes;
        self
    }

    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = root.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        // pdfium takes the cap as an i32.
        self.config.max_rendered_pixels = px.clamp(100, i32::MAX as u32);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn page_number_font_size(mut self, points: f32) -> Self {
        self.config.page_number_font_size = points;
        self
    }

    pub fn page_number_margin(mut self, points: f32) -> Self {
        self.config.page_number_margin = points;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn stream_buffer_bytes(mut self, bytes: usize) -> Self {
        self.config.stream_buffer_bytes = bytes;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, Pdf2ImgError> {
        let c = &self.config;
        if c.max_pdf_upload_bytes == 0 || c.max_image_upload_bytes == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "Upload limits must be greater than zero".into(),
            ));
        }
        if usize::try_from(c.max_pdf_upload_bytes.max(c.max_image_upload_bytes)).is_err() {
            return Err(Pdf2ImgError::InvalidConfig(
                "Upload limits exceed the addressable memory of this platform".into(),
            ));
        }
        if !(c.page_number_font_size > 0.0 && c.page_number_font_size <= 144.0) {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "Page-number font size must be in (0, 144] pt, got {}",
                c.page_number_font_size
            )));
        }
        if !(c.page_number_margin >= 0.0) {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "Page-number margin must be ≥ 0 pt, got {}",
                c.page_number_margin
            )));
        }
        if c.request_timeout_secs == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.stream_buffer_bytes < 1024 {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "Stream buffer must be ≥ 1024 bytes, got {}",
                c.stream_buffer_bytes
            )));
        }
        Ok(self.config)
    }
}

/// The subset of [`ServerConfig`] the engines need, cheap to copy onto the
/// engine and blocking threads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    pub jpeg_quality: u8,
    pub page_number_font_size: f32,
    pub page_number_margin: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        ServerConfig::default().render_settings()
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Target raster format, chosen with the `select` form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    WebP,
    Png,
    Jpeg,
}

impl OutputFormat {
    /// File extension used for archive entries (the form value itself).
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::WebP => "webp",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }

    /// Matching `image` crate format.
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::WebP => image::ImageFormat::WebP,
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Pdf2ImgError;

    /// Form values are matched exactly, as the upload pages send them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webp" => Ok(OutputFormat::WebP),
            "png" => Ok(OutputFormat::Png),
            "jpeg" => Ok(OutputFormat::Jpeg),
            other => Err(Pdf2ImgError::UnsupportedOutputFormat {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Where the page-number overlay is anchored on each PDF page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageNumberPlacement {
    /// No overlay (default).
    #[default]
    None,
    BottomCenter,
    BottomRight,
    BottomLeft,
}

impl PageNumberPlacement {
    /// True when an overlay has to be drawn.
    pub fn is_visible(self) -> bool {
        self != PageNumberPlacement::None
    }

    /// The overlay text for 1-indexed page `current` of `total`.
    pub fn label(current: usize, total: usize) -> String {
        format!(" {current} / {total} ")
    }
}

impl FromStr for PageNumberPlacement {
    type Err = Pdf2ImgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PageNumberPlacement::None),
            "bottom-center" => Ok(PageNumberPlacement::BottomCenter),
            "bottom-right" => Ok(PageNumberPlacement::BottomRight),
            "bottom-left" => Ok(PageNumberPlacement::BottomLeft),
            other => Err(Pdf2ImgError::UnsupportedPlacement {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PageNumberPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PageNumberPlacement::None => "none",
            PageNumberPlacement::BottomCenter => "bottom-center",
            PageNumberPlacement::BottomRight => "bottom-right",
            PageNumberPlacement::BottomLeft => "bottom-left",
        })
    }
}
