//! Call ingestion route.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    services::{IngestRequest, IngestService},
    state::AppState,
    types::{ApiResponse, IngestForm, IngestResponse, MediaInfo},
};

/// POST /ingest - Upload a recording and queue it for analysis
#[utoipa::path(
    post,
    path = "/ingest",
    tag = "Calls",
    request_body(content = IngestForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Call stored as pending and queued", body = IngestResponse),
        (status = 400, description = "Missing field, bad file type or unresolvable identifier", body = ApiError),
        (status = 413, description = "Upload too large", body = ApiError),
    ),
)]
pub async fn ingest_call(
    State(ingest): State<Arc<IngestService>>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let request = read_form(multipart).await?;
    let receipt = ingest.ingest(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            IngestResponse {
                call_id: receipt.call_id,
                media_info: MediaInfo {
                    filename: receipt.file_name,
                    duration_seconds: receipt.duration_seconds,
                },
            },
            "Call ingested successfully and queued for processing",
        )),
    ))
}

async fn read_form(mut multipart: Multipart) -> ApiResult<IngestRequest> {
    let mut request = IngestRequest::default();
    let mut saw_file = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                request.file_name = field.file_name().unwrap_or_default().to_string();
                request.audio = field.bytes().await?.to_vec();
                saw_file = true;
            }
            "agent_identifier" => request.agent_identifier = field.text().await?,
            "issue_category" => request.issue_category = field.text().await?,
            "city_identifier" => request.city_identifier = field.text().await?,
            "customer_name" => request.customer_name = Some(field.text().await?),
            "customer_phone" => request.customer_phone = Some(field.text().await?),
            "call_context" => request.call_context = Some(field.text().await?),
            "agent_manual_note" => request.agent_manual_note = Some(field.text().await?),
            "customer_preferred_language" => {
                request.customer_preferred_language = Some(field.text().await?)
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    if !saw_file {
        return Err(ApiError::missing_field("file"));
    }
    Ok(request)
}

/// Router mounted at the root; the route carries its own `/ingest` path.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ingest", post(ingest_call))
        .with_state(state)
}
