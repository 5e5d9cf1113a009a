//! # Health Check Handlers
//!
//! Liveness and readiness probes for the trigger server.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Liveness probe: GET /health
///
/// Returns OK whenever the process is serving requests.
pub async fn basic_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Readiness probe: GET /ready
///
/// Ready only while the task store is reachable.
pub async fn readiness_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    match state.runner.store().health_check().await {
        Ok(()) => {
            debug!("Readiness check passed");
            Ok(Json(HealthResponse {
                status: "ready".to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            }))
        }
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            Err(ApiError::unavailable(e.to_string()))
        }
    }
}
