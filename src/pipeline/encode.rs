//! Image encoding: `DynamicImage` → WebP / PNG / JPEG file in the workspace.
//!
//! Both engines end here: PDFium hands over a rendered page bitmap, the
//! raster engine a decoded upload. Encoders have different pixel-layout
//! requirements, so the image is normalised first:
//!
//! * JPEG has no alpha channel → flattened to RGB8.
//! * The WebP encoder only takes 8-bit RGB(A) → converted to RGBA8.
//! * PNG takes the image as-is (16-bit uploads keep their depth).

use crate::config::OutputFormat;
use crate::error::Pdf2ImgError;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Encode `img` as `format` and write it to `path`.
///
/// Returns the number of bytes written.
pub fn write_image(
    img: &DynamicImage,
    format: OutputFormat,
    jpeg_quality: u8,
    path: &Path,
) -> Result<u64, Pdf2ImgError> {
    let encode_err = |detail: String| Pdf2ImgError::EncodeFailed {
        path: path.to_path_buf(),
        detail,
    };

    let file = File::create(path).map_err(|e| encode_err(e.to_string()))?;
    let mut writer = BufWriter::new(file);

    let result = match format {
        OutputFormat::Jpeg => {
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut writer, jpeg_quality).encode_image(&rgb)
        }
        OutputFormat::WebP => {
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut writer, ImageFormat::WebP)
        }
        OutputFormat::Png => img.write_to(&mut writer, ImageFormat::Png),
    };
    result.map_err(|e| encode_err(e.to_string()))?;
    writer.flush().map_err(|e| encode_err(e.to_string()))?;

    let written = std::fs::metadata(path)
        .map_err(|e| encode_err(e.to_string()))?
        .len();
    debug!(
        "Encoded {}x{} px → {} ({} bytes)",
        img.width(),
        img.height(),
        format,
        written
    );
    Ok(written)
}
