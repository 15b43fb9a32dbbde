//! PDFium-backed PDF engine.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 7,000 × 10,000 px bitmap. `max_rendered_pixels` caps both edges
//! regardless of physical size, keeping memory per page bounded.
//!
//! ## Page numbers
//!
//! The overlay is a real PDF text object (standard Helvetica) inserted into
//! the page before it is rendered, so it is rasterised at the same DPI as the
//! page content. PDF user space has its origin at the bottom-left corner,
//! which makes "bottom" placements a constant baseline at the margin.

use super::{EngineHandle, SourceDocument};
use crate::config::{OutputFormat, PageNumberPlacement, RenderSettings};
use crate::error::Pdf2ImgError;
use crate::pipeline::encode::write_image;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A bound PDFium library plus the raster settings every document uses.
pub struct PdfiumHandle {
    pdfium: Pdfium,
    settings: RenderSettings,
}

impl PdfiumHandle {
    /// Bind PDFium from `library`, or from the working directory and then
    /// the system search path when no explicit path is configured.
    pub fn bind(library: Option<PathBuf>, settings: RenderSettings) -> Result<Self, Pdf2ImgError> {
        let bindings = match library {
            Some(path) => {
                info!("Binding pdfium from {}", path.display());
                Pdfium::bind_to_library(&path)
                    .map_err(|e| Pdf2ImgError::PdfiumBindingFailed(format!("{e:?}")))?
            }
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|local| {
                    debug!("No pdfium in working directory ({local:?}); trying system library");
                    Pdfium::bind_to_system_library()
                })
                .map_err(|e| Pdf2ImgError::PdfiumBindingFailed(format!("{e:?}")))?,
        };

        Ok(Self {
            pdfium: Pdfium::new(bindings),
            settings,
        })
    }
}

impl EngineHandle for PdfiumHandle {
    type Document<'a> = PdfiumDocument<'a>;

    fn load_document<'a>(&'a self, path: &Path) -> Result<PdfiumDocument<'a>, Pdf2ImgError> {
        let document = self.pdfium.load_pdf_from_file(path, None).map_err(|e| {
            Pdf2ImgError::CorruptPdf {
                file_name: path.display().to_string(),
                detail: format!("{e:?}"),
            }
        })?;

        let page_count = document.pages().len() as usize;
        info!("PDF loaded: {} pages", page_count);

        Ok(PdfiumDocument {
            document,
            page_count,
            current: None,
            font: None,
            format: OutputFormat::WebP,
            settings: self.settings,
        })
    }
}

/// An open PDF, positioned on at most one page.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    page_count: usize,
    current: Option<(usize, PdfPage<'a>)>,
    font: Option<PdfFontToken>,
    format: OutputFormat,
    settings: RenderSettings,
}

impl<'a> PdfiumDocument<'a> {
    fn current_page(&mut self) -> Result<(usize, &mut PdfPage<'a>), Pdf2ImgError> {
        match self.current.as_mut() {
            Some((idx, page)) => Ok((*idx, page)),
            None => Err(Pdf2ImgError::Internal("no page selected".into())),
        }
    }
}

impl SourceDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn select_page(&mut self, index: usize) -> bool {
        let Ok(page_index) = u16::try_from(index) else {
            warn!("Page {} is beyond the engine's page index range", index + 1);
            return false;
        };
        // Release the previous page before loading the next one.
        self.current = None;
        match self.document.pages().get(page_index) {
            Ok(page) => {
                self.current = Some((index, page));
                true
            }
            Err(e) => {
                warn!("Cannot select page {}: {:?}", index + 1, e);
                false
            }
        }
    }

    fn set_output_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    fn draw_text_overlay(
        &mut self,
        placement: PageNumberPlacement,
        text: &str,
    ) -> Result<(), Pdf2ImgError> {
        if !placement.is_visible() {
            return Ok(());
        }
        let font = match self.font {
            Some(font) => font,
            None => {
                let font = self.document.fonts_mut().helvetica();
                self.font = Some(font);
                font
            }
        };
        let size = self.settings.page_number_font_size;
        let margin = self.settings.page_number_margin;

        let (idx, page) = self.current_page()?;
        let (x, y) = overlay_origin(
            placement,
            page.width().value,
            helvetica_text_width(text, size),
            margin,
        );
        page.objects_mut()
            .create_text_object(
                PdfPoints::new(x),
                PdfPoints::new(y),
                text,
                font,
                PdfPoints::new(size),
            )
            .map_err(|e| Pdf2ImgError::OverlayFailed {
                page: idx + 1,
                detail: format!("{e:?}"),
            })?;
        debug!("Drew '{}' on page {} at ({:.1}, {:.1})", text, idx + 1, x, y);
        Ok(())
    }

    fn write_current_page(&mut self, path: &Path) -> Result<(), Pdf2ImgError> {
        let settings = self.settings;
        let format = self.format;
        let (idx, page) = self.current_page()?;

        let max = i32::try_from(settings.max_rendered_pixels).unwrap_or(i32::MAX);
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(settings.dpi as f32 / 72.0)
            .set_maximum_width(max)
            .set_maximum_height(max)
            .render_form_data(true);

        let bitmap =
            page.render_with_config(&render_config)
                .map_err(|e| Pdf2ImgError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        write_image(&image, format, settings.jpeg_quality, path)?;
        Ok(())
    }
}

/// Advance widths of the standard Helvetica glyphs used by page labels,
/// in thousandths of an em (from the Adobe core-14 font metrics).
fn helvetica_advance(c: char) -> f32 {
    match c {
        ' ' | '/' => 278.0,
        _ => 556.0,
    }
}

/// Width of `text` set in Helvetica at `font_size` points.
pub(crate) fn helvetica_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(helvetica_advance).sum::<f32>() * font_size / 1000.0
}

/// Baseline origin of a label `text_width` wide on a page `page_width` wide.
///
/// Never returns a negative x, so an over-long label on a narrow page starts
/// at the left edge instead of being cut off.
pub(crate) fn overlay_origin(
    placement: PageNumberPlacement,
    page_width: f32,
    text_width: f32,
    margin: f32,
) -> (f32, f32) {
    let x = match placement {
        PageNumberPlacement::BottomCenter | PageNumberPlacement::None => {
            (page_width - text_width) / 2.0
        }
        PageNumberPlacement::BottomRight => page_width - text_width - margin,
        PageNumberPlacement::BottomLeft => margin,
    };
    (x.max(0.0), margin)
}
