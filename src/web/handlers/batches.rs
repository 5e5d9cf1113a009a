//! # Batch Trigger Handler

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::{error, info};

use crate::orchestration::BatchSummary;
use crate::web::errors::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunBatchRequest {
    pub limit: Option<u32>,
}

/// Run one batch: POST /v1/batches/run
///
/// The body is optional; `{"limit": n}` overrides `engine.default_batch_size`.
pub async fn run_batch(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<BatchSummary>> {
    let request: RunBatchRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RunBatchRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))?
    };

    let limit = request
        .limit
        .unwrap_or(state.runner.config().default_batch_size);
    info!(limit, "Batch run triggered over HTTP");

    let summary = state.runner.run_batch(limit).await.map_err(|e| {
        error!(error = %e, "Batch run failed");
        ApiError::from(e)
    })?;
    Ok(Json(summary))
}
