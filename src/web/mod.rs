//! # HTTP Trigger
//!
//! Minimal axum server so an external scheduler (cron, a platform scheduler, a
//! Kubernetes CronJob) can trigger batch runs over HTTP.
//!
//! | Method | Path              | Purpose                                   |
//! |--------|-------------------|-------------------------------------------|
//! | POST   | `/v1/batches/run` | run one batch, returns the `BatchSummary` |
//! | GET    | `/health`         | liveness                                  |
//! | GET    | `/ready`          | readiness (task store reachable)          |

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Result, TaskerError};
pub use errors::{ApiError, ApiResult};
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/batches/run", post(handlers::batches::run_batch))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_token,
        ));

    Router::new()
        .route("/health", get(handlers::health::basic_health))
        .route("/ready", get(handlers::health::readiness_check))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves
pub async fn serve(
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let bind_address = state.config.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| {
            TaskerError::ConfigurationError(format!("failed to bind {bind_address}: {e}"))
        })?;

    info!(bind_address = %bind_address, "HTTP trigger listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| TaskerError::OrchestrationError(format!("HTTP server error: {e}")))
}
