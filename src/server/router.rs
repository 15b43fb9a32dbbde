//! Route table with per-route body limits and the shared middleware stack.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::engine::EngineHandle;
use crate::server::handlers::{
    health_handler, method_not_allowed, upload_images_handler, upload_pdf_handler,
};
use crate::server::state::AppState;

pub fn create_router<H: EngineHandle + 'static>(state: AppState<H>) -> Router {
    let pdf_limit = body_limit(state.config.max_pdf_upload_bytes);
    let image_limit = body_limit(state.config.max_image_upload_bytes);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route(
            "/upload",
            post(upload_pdf_handler::<H>)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(pdf_limit)),
        )
        .route(
            "/upload-multi",
            post(upload_images_handler::<H>)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(image_limit)),
        )
        .route("/health", get(health_handler))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(trace_layer)
        .with_state(state)
}

fn body_limit(bytes: u64) -> usize {
    usize::try_from(bytes).unwrap_or(usize::MAX)
}
