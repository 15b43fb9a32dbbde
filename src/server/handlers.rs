//! Request handlers for the upload and health routes.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::convert::convert;
use crate::engine::EngineHandle;
use crate::error::Pdf2ImgError;
use crate::pipeline::intake::{ConversionRequest, UploadForm};
use crate::server::response::zip_response;
use crate::server::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `POST /upload`: one PDF → ZIP of its pages.
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_pdf_handler<H: EngineHandle + 'static>(
    State(state): State<AppState<H>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let limit = state.config.max_pdf_upload_bytes;
    let result = async {
        let form = UploadForm::read(&mut multipart.map_err(rejected)?, limit).await?;
        let request = ConversionRequest::pdf(form)?;
        convert(&state.engine, request, &state.config).await
    }
    .await;

    match result {
        Ok(body) => zip_response(body),
        Err(e) => e.into_response(),
    }
}

/// `POST /upload-multi`: a batch of images → ZIP of converted images.
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_images_handler<H: EngineHandle + 'static>(
    State(state): State<AppState<H>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let limit = state.config.max_image_upload_bytes;
    let result = async {
        let form = UploadForm::read(&mut multipart.map_err(rejected)?, limit).await?;
        let request = ConversionRequest::image_batch(form)?;
        convert(&state.engine, request, &state.config).await
    }
    .await;

    match result {
        Ok(body) => zip_response(body),
        Err(e) => e.into_response(),
    }
}

/// Any method other than POST on an upload route.
pub async fn method_not_allowed(method: Method) -> Response {
    Pdf2ImgError::MethodNotAllowed {
        method: method.to_string(),
    }
    .into_response()
}

fn rejected(rejection: MultipartRejection) -> Pdf2ImgError {
    Pdf2ImgError::MalformedUpload {
        detail: rejection.body_text(),
    }
}
