//! Upload intake: multipart form → validated [`ConversionRequest`].
//!
//! The body-size cap itself is enforced by axum's `DefaultBodyLimit` on each
//! route; this module turns the resulting multipart error into
//! [`Pdf2ImgError::PayloadTooLarge`] and validates the form in a fixed order:
//!
//! 1. `select` (output format, required)
//! 2. `page-number` (placement, optional, PDF endpoint only)
//! 3. file presence
//! 4. content sniffing
//!
//! Everything here happens before a workspace exists or an engine is touched.

use crate::config::{OutputFormat, PageNumberPlacement, MB};
use crate::error::Pdf2ImgError;
use crate::pipeline::sniff::{require_image, require_pdf};
use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::debug;

/// Form field carrying the output format.
pub const FORMAT_FIELD: &str = "select";
/// Form field carrying the page-number placement.
pub const PLACEMENT_FIELD: &str = "page-number";
/// Form field carrying the PDF.
pub const PDF_FILE_FIELD: &str = "file";

/// One file part of the form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: String,
    pub bytes: Bytes,
}

/// The raw form: file parts in submission order plus the text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// Drain `multipart` into memory.
    ///
    /// `limit_bytes` is only used to word the error when the route's body
    /// limit trips while reading.
    pub async fn read(multipart: &mut Multipart, limit_bytes: u64) -> Result<Self, Pdf2ImgError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, limit_bytes))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| multipart_error(e, limit_bytes))?;
                    // An untouched <input type="file"> still submits an empty part.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    debug!(field = %name, file = %file_name, bytes = bytes.len(), "File part received");
                    form.files.push(UploadedFile {
                        field_name: name,
                        file_name,
                        bytes,
                    });
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| multipart_error(e, limit_bytes))?;
                    form.fields.entry(name).or_insert(value);
                }
            }
        }
        Ok(form)
    }

    /// First value of the text field `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn output_format(&self) -> Result<OutputFormat, Pdf2ImgError> {
        self.field(FORMAT_FIELD).unwrap_or_default().parse()
    }

    fn placement(&self) -> Result<PageNumberPlacement, Pdf2ImgError> {
        match self.field(PLACEMENT_FIELD) {
            Some(value) => value.parse(),
            None => Ok(PageNumberPlacement::None),
        }
    }
}

fn multipart_error(e: MultipartError, limit_bytes: u64) -> Pdf2ImgError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Pdf2ImgError::PayloadTooLarge {
            limit_mb: limit_bytes / MB,
        }
    } else {
        Pdf2ImgError::MalformedUpload {
            detail: e.body_text(),
        }
    }
}

/// A validated conversion job, owned by one pipeline run.
#[derive(Debug)]
pub enum ConversionRequest {
    Pdf(PdfRequest),
    ImageBatch(ImageBatchRequest),
}

#[derive(Debug)]
pub struct PdfRequest {
    pub file_name: String,
    pub bytes: Bytes,
    pub format: OutputFormat,
    pub placement: PageNumberPlacement,
}

#[derive(Debug)]
pub struct ImageBatchRequest {
    /// In submission order.
    pub images: Vec<UploadedFile>,
    pub format: OutputFormat,
}

impl ConversionRequest {
    /// Validate a form posted to the PDF endpoint.
    pub fn pdf(form: UploadForm) -> Result<Self, Pdf2ImgError> {
        let format = form.output_format()?;
        let placement = form.placement()?;

        let file = form
            .files
            .into_iter()
            .find(|f| f.field_name == PDF_FILE_FIELD)
            .ok_or_else(|| Pdf2ImgError::MissingFile {
                hint: format!("attach the PDF in the '{PDF_FILE_FIELD}' field"),
            })?;
        require_pdf(&file.file_name, &file.bytes)?;

        Ok(ConversionRequest::Pdf(PdfRequest {
            file_name: file.file_name,
            bytes: file.bytes,
            format,
            placement,
        }))
    }

    /// Validate a form posted to the image-batch endpoint.
    ///
    /// Every file part counts, whatever its field name. A single file that
    /// is not an image rejects the whole batch.
    pub fn image_batch(form: UploadForm) -> Result<Self, Pdf2ImgError> {
        let format = form.output_format()?;

        if form.files.is_empty() {
            return Err(Pdf2ImgError::MissingFile {
                hint: "attach one or more images".into(),
            });
        }
        for file in &form.files {
            require_image(&file.file_name, &file.bytes)?;
        }

        Ok(ConversionRequest::ImageBatch(ImageBatchRequest {
            images: form.files,
            format,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &[u8] = b"%PDF-1.4\n%EOF";
    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn file(field: &str, name: &str, bytes: &'static [u8]) -> UploadedFile {
        UploadedFile {
            field_name: field.into(),
            file_name: name.into(),
            bytes: Bytes::from_static(bytes),
        }
    }

    fn form(fields: &[(&str, &str)], files: Vec<UploadedFile>) -> UploadForm {
        UploadForm {
            files,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn pdf_request_defaults_to_no_page_numbers() {
        let req = ConversionRequest::pdf(form(
            &[("select", "png")],
            vec![file("file", "deck.pdf", PDF)],
        ))
        .unwrap();
        let ConversionRequest::Pdf(pdf) = req else {
            panic!("expected a PDF request");
        };
        assert_eq!(pdf.format, OutputFormat::Png);
        assert_eq!(pdf.placement, PageNumberPlacement::None);
        assert_eq!(pdf.file_name, "deck.pdf");
    }

    #[test]
    fn format_is_checked_before_file_presence() {
        let err = ConversionRequest::pdf(form(&[("select", "bmp")], vec![])).unwrap_err();
        assert!(matches!(err, Pdf2ImgError::UnsupportedOutputFormat { .. }));

        let err = ConversionRequest::pdf(form(&[], vec![])).unwrap_err();
        assert!(matches!(err, Pdf2ImgError::UnsupportedOutputFormat { ref value } if value.is_empty()));
    }

    #[test]
    fn placement_is_checked_before_sniffing() {
        let err = ConversionRequest::pdf(form(
            &[("select", "webp"), ("page-number", "top")],
            vec![file("file", "a.png", PNG)],
        ))
        .unwrap_err();
        assert!(matches!(err, Pdf2ImgError::UnsupportedPlacement { .. }));
    }

    #[test]
    fn pdf_requires_the_file_field() {
        let err = ConversionRequest::pdf(form(
            &[("select", "webp")],
            vec![file("attachment", "a.pdf", PDF)],
        ))
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn pdf_endpoint_rejects_non_pdf_bytes() {
        let err = ConversionRequest::pdf(form(
            &[("select", "webp")],
            vec![file("file", "fake.pdf", PNG)],
        ))
        .unwrap_err();
        assert_eq!(err.status_code(), 415);
    }

    #[test]
    fn image_batch_keeps_submission_order() {
        let req = ConversionRequest::image_batch(form(
            &[("select", "jpeg")],
            vec![file("a", "z.png", PNG), file("b", "a.png", PNG)],
        ))
        .unwrap();
        let ConversionRequest::ImageBatch(batch) = req else {
            panic!("expected an image batch");
        };
        let names: Vec<_> = batch.images.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["z.png", "a.png"]);
        assert_eq!(batch.format, OutputFormat::Jpeg);
    }

    #[test]
    fn one_bad_image_rejects_the_batch() {
        let err = ConversionRequest::image_batch(form(
            &[("select", "png")],
            vec![file("f", "ok.png", PNG), file("f", "notes.txt", b"hello")],
        ))
        .unwrap_err();
        assert_eq!(err.status_code(), 415);
        assert!(err.to_string().contains("notes.txt"));
    }

    #[test]
    fn empty_batch_is_a_bad_request() {
        let err = ConversionRequest::image_batch(form(&[("select", "png")], vec![])).unwrap_err();
        assert!(matches!(err, Pdf2ImgError::MissingFile { .. }));
    }
}
