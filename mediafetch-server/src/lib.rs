// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `MediaFetch` Server
//!
//! Thin HTTP transport over the job coordinator and artifact store. No
//! orchestration happens here; handlers translate requests into
//! coordinator calls and errors into status codes.
//!
//! ## Usage
//!
//! ```ignore
//! let state = AppState::new(coordinator, proxies);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! mediafetch_server::serve(listener, state, shutdown_signal()).await?;
//! ```

pub mod error;
pub mod routes;
pub mod state;

use std::future::Future;

use tokio::net::TcpListener;
use tracing::{info, warn};

pub use error::{ApiError, ApiResult};
pub use routes::{HealthResponse, SubmitRequest, SubmitResponse, router};
pub use state::AppState;

/// Serves the API on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an IO error if the listener fails.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

/// Resolves on Ctrl+C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
