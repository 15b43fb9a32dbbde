//! HTTP surface: routes, handlers, and the serve loop.
//!
//! | Route           | Method | Purpose                         |
//! |-----------------|--------|---------------------------------|
//! | `/upload`       | POST   | one PDF → ZIP of page images    |
//! | `/upload-multi` | POST   | image batch → ZIP of images     |
//! | `/health`       | GET    | liveness + version              |

pub mod handlers;
pub mod response;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;

use crate::engine::EngineHandle;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::info;

/// Serve `state` on `listener` until SIGINT or SIGTERM.
///
/// In-flight responses are allowed to finish; archives still streaming are
/// completed before the call returns.
pub async fn serve<H: EngineHandle + 'static>(
    listener: TcpListener,
    state: AppState<H>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "HTTP server listening");
    }
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = ctrl_c() => info!(signal = "SIGINT", "Shutting down"),
        _ = wait_for_sigterm() => info!(signal = "SIGTERM", "Shutting down"),
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("Cannot install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await;
}
