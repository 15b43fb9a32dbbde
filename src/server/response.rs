//! Response finalizer and error responses.

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::{ErrorClass, Pdf2ImgError};
use crate::stream::ArchiveByteStream;

/// Attachment name every archive is offered under.
pub const ARCHIVE_FILE_NAME: &str = "images.zip";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Wrap an archive stream in a `200 OK` download response.
pub fn zip_response(body: ArchiveByteStream) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{ARCHIVE_FILE_NAME}\""),
            ),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

impl IntoResponse for Pdf2ImgError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self.class() {
            ErrorClass::ClientInput => {
                warn!(status = status.as_u16(), error = %self, "Request rejected")
            }
            ErrorClass::Engine | ErrorClass::Resource => {
                error!(status = status.as_u16(), error = %self, "Conversion failed")
            }
        }

        let allow_post = matches!(self, Pdf2ImgError::MethodNotAllowed { .. });
        let mut response = (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response();
        if allow_post {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}
