//! Raster-image engine for the image-batch endpoint.
//!
//! Decoding and re-encoding is pure Rust (`image` crate), so image batches
//! never touch PDFium and run on the blocking pool instead of the engine
//! thread.

use super::SourceDocument;
use crate::config::{OutputFormat, PageNumberPlacement};
use crate::error::Pdf2ImgError;
use crate::pipeline::encode::write_image;
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

/// One decoded upload; always a single page.
pub struct RasterDocument {
    image: DynamicImage,
    format: OutputFormat,
    jpeg_quality: u8,
}

impl RasterDocument {
    /// Decode `bytes` (any format the sniffer accepts).
    pub fn decode(file_name: &str, bytes: &[u8], jpeg_quality: u8) -> Result<Self, Pdf2ImgError> {
        let image = image::load_from_memory(bytes).map_err(|e| Pdf2ImgError::DecodeFailed {
            file_name: file_name.to_string(),
            detail: e.to_string(),
        })?;
        debug!(
            "Decoded '{}' → {}x{} px",
            file_name,
            image.width(),
            image.height()
        );
        Ok(Self {
            image,
            format: OutputFormat::WebP,
            jpeg_quality,
        })
    }
}

impl SourceDocument for RasterDocument {
    fn page_count(&self) -> usize {
        1
    }

    fn select_page(&mut self, index: usize) -> bool {
        index == 0
    }

    fn set_output_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    fn draw_text_overlay(
        &mut self,
        _placement: PageNumberPlacement,
        _text: &str,
    ) -> Result<(), Pdf2ImgError> {
        Err(Pdf2ImgError::UnsupportedOperation(
            "page numbers are only drawn on PDF pages".into(),
        ))
    }

    fn write_current_page(&mut self, path: &Path) -> Result<(), Pdf2ImgError> {
        write_image(&self.image, self.format, self.jpeg_quality, path).map(|_| ())
    }
}

/// A small opaque test image whose colour depends on `seed`.
#[cfg(test)]
pub(crate) fn solid_page(seed: usize) -> DynamicImage {
    let shade = (seed * 40 % 256) as u8;
    DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        16,
        12,
        image::Rgb([shade, 255 - shade, 128]),
    ))
}
