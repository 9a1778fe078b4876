//! Dashboard REST API Routes
//!
//! State roll-up and the escalation monitor. Both are pure reads over the
//! stored calls and insights.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

use crate::{
    error::{ApiError, ApiResult},
    services::DashboardService,
    state::AppState,
    types::{ApiResponse, EscalationFeed, StateSummary},
};

/// GET /api/dashboard/states - Per-state roll-up of city insights
#[utoipa::path(
    get,
    path = "/api/dashboard/states",
    tag = "Dashboard",
    responses(
        (status = 200, description = "States ordered by name", body = Vec<StateSummary>),
        (status = 500, description = "Internal server error", body = ApiError),
    ),
)]
pub async fn state_dashboard(
    State(dashboard): State<DashboardService>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ApiResponse::ok(dashboard.state_dashboard().await?)))
}

/// GET /api/escalations/recent - Flagged calls inside the escalation window
#[utoipa::path(
    get,
    path = "/api/escalations/recent",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Escalated calls, newest first", body = EscalationFeed),
        (status = 500, description = "Internal server error", body = ApiError),
    ),
)]
pub async fn recent_escalations(
    State(dashboard): State<DashboardService>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ApiResponse::ok(dashboard.recent_escalations().await?)))
}

/// Router mounted under `/api/dashboard`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/states", get(state_dashboard))
        .with_state(state)
}

/// Router mounted under `/api/escalations`.
pub fn create_escalation_router(state: AppState) -> Router {
    Router::new()
        .route("/recent", get(recent_escalations))
        .with_state(state)
}
