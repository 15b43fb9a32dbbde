//! Content sniffing: classify an upload by its leading bytes.
//!
//! The declared multipart `Content-Type` and the file extension are both
//! caller-controlled, so neither is trusted. Only the magic bytes decide
//! whether a file reaches an engine.

use crate::error::Pdf2ImgError;
use std::fmt;

/// Media types the service can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Jpeg,
    Png,
    Gif,
    WebP,
    Unknown,
}

impl MediaType {
    /// Classify `bytes` by signature.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF-") {
            MediaType::Pdf
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            MediaType::Jpeg
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            MediaType::Png
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            MediaType::Gif
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            MediaType::WebP
        } else {
            MediaType::Unknown
        }
    }

    /// MIME type string, as reported in error messages.
    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::WebP => "image/webp",
            MediaType::Unknown => "application/octet-stream",
        }
    }

    pub fn is_image(self) -> bool {
        matches!(
            self,
            MediaType::Jpeg | MediaType::Png | MediaType::Gif | MediaType::WebP
        )
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Accept `bytes` only if they are a PDF.
pub fn require_pdf(file_name: &str, bytes: &[u8]) -> Result<(), Pdf2ImgError> {
    match MediaType::detect(bytes) {
        MediaType::Pdf => Ok(()),
        other => Err(Pdf2ImgError::UnsupportedMediaType {
            file_name: file_name.to_string(),
            detected: other.to_string(),
            expected: "application/pdf",
        }),
    }
}

/// Accept `bytes` only if they are one of the supported raster formats.
pub fn require_image(file_name: &str, bytes: &[u8]) -> Result<MediaType, Pdf2ImgError> {
    match MediaType::detect(bytes) {
        t if t.is_image() => Ok(t),
        other => Err(Pdf2ImgError::UnsupportedMediaType {
            file_name: file_name.to_string(),
            detected: other.to_string(),
            expected: "image/jpeg, image/png, image/gif or image/webp",
        }),
    }
}
