//! Error types for the edgequake-pdf2img library.
//!
//! Every failure in the pipeline is a [`Pdf2ImgError`]. Errors are grouped
//! into three [`ErrorClass`]es that decide how they surface:
//!
//! * **Client input**: wrong method, oversized body, unknown format or
//!   placement, wrong media type, missing file. Always detected before any
//!   engine work and answered with a 4xx status.
//! * **Engine**: the PDF/raster engine could not load, render, overlay or
//!   encode. Fatal to the request, never to the process.
//! * **Resource**: scratch directory or archive I/O failed. Same treatment as
//!   engine errors.
//!
//! Once the ZIP body has started streaming the status line is gone, so a
//! late error can only cut the connection (see [`crate::stream`]).

use std::path::PathBuf;
use thiserror::Error;

/// How an error is surfaced to the caller and in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself is unacceptable; reported as 4xx.
    ClientInput,
    /// The rendering engine failed on this request's document.
    Engine,
    /// Local I/O (workspace, archive pipe) failed.
    Resource,
}

/// All errors returned by the edgequake-pdf2img library.
#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    // ── Client input errors ───────────────────────────────────────────────
    /// The endpoint only accepts POST.
    #[error("Method {method} is not allowed; use POST")]
    MethodNotAllowed { method: String },

    /// The request body exceeded the endpoint's upload limit.
    #[error("Upload is too large; the limit for this endpoint is {limit_mb} MB")]
    PayloadTooLarge { limit_mb: u64 },

    /// The multipart body could not be parsed.
    #[error("Malformed upload: {detail}")]
    MalformedUpload { detail: String },

    /// No usable file part was found in the form.
    #[error("No file uploaded: {hint}")]
    MissingFile { hint: String },

    /// `select` was not one of webp, png, jpeg.
    #[error("Output format '{value}' is not allowed; choose webp, png or jpeg")]
    UnsupportedOutputFormat { value: String },

    /// `page-number` was not one of the recognised placements.
    #[error(
        "Page-number placement '{value}' is not allowed; choose none, bottom-center, bottom-right or bottom-left"
    )]
    UnsupportedPlacement { value: String },

    /// The uploaded bytes are not of an accepted media type.
    #[error("File '{file_name}' has media type {detected}; expected {expected}")]
    UnsupportedMediaType {
        file_name: String,
        detected: String,
        expected: &'static str,
    },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// PDFium could not be bound.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or pass --pdfium-lib.\n\
Pre-built libraries: https://github.com/bblanchon/pdfium-binaries/releases"
    )]
    PdfiumBindingFailed(String),

    /// The engine worker is not running (start-up failed or shut down).
    #[error("Conversion engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The PDF could not be opened by the engine.
    #[error("PDF '{file_name}' could not be read: {detail}")]
    CorruptPdf { file_name: String, detail: String },

    /// An uploaded image could not be decoded.
    #[error("Image '{file_name}' could not be decoded: {detail}")]
    DecodeFailed { file_name: String, detail: String },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The page-number overlay could not be drawn.
    #[error("Page number overlay failed on page {page}: {detail}")]
    OverlayFailed { page: usize, detail: String },

    /// The converted image could not be encoded or written.
    #[error("Encoding '{path}' failed: {detail}")]
    EncodeFailed { path: PathBuf, detail: String },

    /// The engine was asked for something it cannot do.
    #[error("Unsupported engine operation: {0}")]
    UnsupportedOperation(String),

    // ── Resource errors ───────────────────────────────────────────────────
    /// The per-request scratch directory could not be created or removed.
    #[error("Workspace error at '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A ZIP entry could not be written to the response.
    #[error("Failed to append '{entry}' to the archive: {detail}")]
    ArchiveWriteFailed { entry: String, detail: String },

    /// The archive side stopped accepting units (usually a client disconnect).
    #[error("Archive stream closed before conversion finished")]
    ArchiveClosed,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2ImgError {
    /// Which of the three failure families this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MethodNotAllowed { .. }
            | Self::PayloadTooLarge { .. }
            | Self::MalformedUpload { .. }
            | Self::MissingFile { .. }
            | Self::UnsupportedOutputFormat { .. }
            | Self::UnsupportedPlacement { .. }
            | Self::UnsupportedMediaType { .. } => ErrorClass::ClientInput,
            Self::PdfiumBindingFailed(_)
            | Self::EngineUnavailable(_)
            | Self::CorruptPdf { .. }
            | Self::DecodeFailed { .. }
            | Self::RasterisationFailed { .. }
            | Self::OverlayFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::UnsupportedOperation(_) => ErrorClass::Engine,
            Self::Workspace { .. }
            | Self::ArchiveWriteFailed { .. }
            | Self::ArchiveClosed
            | Self::InvalidConfig(_)
            | Self::Internal(_) => ErrorClass::Resource,
        }
    }

    /// HTTP status code used when the error is reported before streaming.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MethodNotAllowed { .. } => 405,
            Self::PayloadTooLarge { .. } => 413,
            Self::UnsupportedMediaType { .. } => 415,
            Self::MalformedUpload { .. }
            | Self::MissingFile { .. }
            | Self::UnsupportedOutputFormat { .. }
            | Self::UnsupportedPlacement { .. } => 400,
            // The upload passed the signature check but the engine rejects it.
            Self::CorruptPdf { .. } | Self::DecodeFailed { .. } => 422,
            Self::PdfiumBindingFailed(_) | Self::EngineUnavailable(_) => 503,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        let errors = [
            Pdf2ImgError::MethodNotAllowed {
                method: "GET".into(),
            },
            Pdf2ImgError::PayloadTooLarge { limit_mb: 30 },
            Pdf2ImgError::UnsupportedOutputFormat {
                value: "tiff".into(),
            },
            Pdf2ImgError::UnsupportedPlacement {
                value: "top".into(),
            },
            Pdf2ImgError::UnsupportedMediaType {
                file_name: "a.txt".into(),
                detected: "unknown".into(),
                expected: "application/pdf",
            },
        ];
        for e in errors {
            assert_eq!(e.class(), ErrorClass::ClientInput, "{e}");
            assert!((400..500).contains(&e.status_code()), "{e}");
        }
    }

    #[test]
    fn engine_and_resource_errors_are_not_client_errors() {
        let e = Pdf2ImgError::RasterisationFailed {
            page: 3,
            detail: "boom".into(),
        };
        assert_eq!(e.class(), ErrorClass::Engine);
        assert_eq!(e.status_code(), 500);
        assert!(e.to_string().contains("page 3"));

        let e = Pdf2ImgError::Workspace {
            path: "/tmp/x".into(),
            source: std::io::Error::other("disk full"),
        };
        assert_eq!(e.class(), ErrorClass::Resource);
        assert!(e.to_string().contains("disk full"));
    }

    #[test]
    fn payload_too_large_display() {
        let e = Pdf2ImgError::PayloadTooLarge { limit_mb: 100 };
        assert!(e.to_string().contains("100 MB"), "got: {e}");
        assert_eq!(e.status_code(), 413);
    }

    #[test]
    fn corrupt_pdf_is_unprocessable() {
        let e = Pdf2ImgError::CorruptPdf {
            file_name: "x.pdf".into(),
            detail: "bad xref".into(),
        };
        assert_eq!(e.status_code(), 422);
        assert!(e.to_string().contains("x.pdf"));
    }
}
