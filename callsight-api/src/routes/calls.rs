//! Call processing routes: re-run analysis and poll status.

use axum::{extract::State, response::IntoResponse, routing::{get, post}, Json, Router};
use callsight_core::{CallId, ProcessingStatus};
use callsight_storage::InsightStore;
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    extractors::PathId,
    services::CallProcessor,
    state::AppState,
    types::{ApiResponse, CallStatusResponse},
};

/// POST /api/calls/{id}/process - Run analysis for a call again
///
/// Only calls still in flight (`pending`, `transcribed`) can be processed;
/// the handler waits for the outcome.
#[utoipa::path(
    post,
    path = "/api/calls/{id}/process",
    tag = "Calls",
    params(("id" = String, Path, description = "Call ID", format = "uuid")),
    responses(
        (status = 200, description = "Processing finished; status reports the outcome", body = CallStatusResponse),
        (status = 404, description = "Call not found", body = ApiError),
        (status = 409, description = "Call already analyzed or failed", body = ApiError),
    ),
)]
pub async fn process_call(
    State(store): State<Arc<dyn InsightStore>>,
    State(processor): State<Arc<CallProcessor>>,
    PathId(call_id): PathId<CallId>,
) -> ApiResult<impl IntoResponse> {
    let call = store
        .call_get(call_id)
        .await?
        .ok_or_else(|| ApiError::call_not_found(call_id))?;
    if call.processing_status.is_terminal() {
        return Err(ApiError::state_conflict(format!(
            "Call {} is already {}",
            call_id, call.processing_status
        )));
    }

    let status = processor.process(call_id).await?;
    let message = match status {
        ProcessingStatus::Analyzed => "Call analyzed successfully",
        _ => "Call processing failed",
    };
    Ok(Json(ApiResponse::with_message(
        CallStatusResponse {
            call_id,
            processing_status: status,
            audio_url: call.audio_url,
        },
        message,
    )))
}

/// GET /api/calls/{id}/status - Processing status and recording URL
#[utoipa::path(
    get,
    path = "/api/calls/{id}/status",
    tag = "Calls",
    params(("id" = String, Path, description = "Call ID", format = "uuid")),
    responses(
        (status = 200, description = "Current processing status", body = CallStatusResponse),
        (status = 404, description = "Call not found", body = ApiError),
    ),
)]
pub async fn call_status(
    State(store): State<Arc<dyn InsightStore>>,
    PathId(call_id): PathId<CallId>,
) -> ApiResult<impl IntoResponse> {
    let call = store
        .call_get(call_id)
        .await?
        .ok_or_else(|| ApiError::call_not_found(call_id))?;
    Ok(Json(ApiResponse::ok(CallStatusResponse {
        call_id,
        processing_status: call.processing_status,
        audio_url: call.audio_url,
    })))
}

/// Router mounted under `/api/calls`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/:id/process", post(process_call))
        .route("/:id/status", get(call_status))
        .with_state(state)
}
