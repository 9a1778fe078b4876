//! City REST API Routes

use axum::{extract::State, response::IntoResponse, routing::{get, post}, Json, Router};
use callsight_core::{CityId, CityInsight};
use callsight_insights::InsightPipeline;

use crate::{
    error::{ApiError, ApiResult},
    extractors::PathId,
    services::DashboardService,
    state::AppState,
    telemetry::METRICS,
    types::{ApiResponse, CityDetails, CityInfo, RefreshResponse},
};

/// GET /api/cities - All cities by name
#[utoipa::path(
    get,
    path = "/api/cities",
    tag = "Cities",
    responses(
        (status = 200, description = "Cities ordered by name", body = Vec<CityInfo>),
        (status = 500, description = "Internal server error", body = ApiError),
    ),
)]
pub async fn list_cities(State(dashboard): State<DashboardService>) -> ApiResult<impl IntoResponse> {
    Ok(Json(ApiResponse::ok(dashboard.cities().await?)))
}

/// GET /api/cities/{id} - City drill-down
#[utoipa::path(
    get,
    path = "/api/cities/{id}",
    tag = "Cities",
    params(("id" = i32, Path, description = "City ID")),
    responses(
        (status = 200, description = "Metrics, volume and narratives for the city", body = CityDetails),
        (status = 400, description = "Malformed city id", body = ApiError),
        (status = 404, description = "City not found", body = ApiError),
    ),
)]
pub async fn city_details(
    State(dashboard): State<DashboardService>,
    PathId(city_id): PathId<CityId>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ApiResponse::ok(dashboard.city_details(city_id).await?)))
}

/// POST /api/cities/{id}/generate-insights - Refresh the city's insight
#[utoipa::path(
    post,
    path = "/api/cities/{id}/generate-insights",
    tag = "Cities",
    params(("id" = i32, Path, description = "City ID")),
    responses(
        (status = 200, description = "Insight served from cache or regenerated", body = RefreshResponse<CityInsight>),
        (status = 404, description = "City not found", body = ApiError),
        (status = 500, description = "Insight generation failed", body = ApiError),
    ),
)]
pub async fn generate_insights(
    State(pipeline): State<InsightPipeline>,
    PathId(city_id): PathId<CityId>,
) -> ApiResult<impl IntoResponse> {
    let report = match pipeline.refresh_city(city_id).await {
        Ok(report) => report,
        Err(err) => {
            record_refresh("error");
            return Err(err.into());
        }
    };
    record_refresh(report.decision.label());

    let message = if report.decision.is_cached() {
        "Returning cached insights"
    } else {
        "City insights generated successfully"
    };
    Ok(Json(ApiResponse::with_message(
        RefreshResponse {
            source: report.source.as_str().to_string(),
            reason: report.decision.label().to_string(),
            insight: report.insight,
        },
        message,
    )))
}

fn record_refresh(outcome: &str) {
    if let Ok(m) = METRICS.as_ref() {
        m.record_refresh("city", outcome);
    }
}

/// Create the city router, mounted under `/api/cities`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_cities))
        .route("/:id", get(city_details))
        .route("/:id/generate-insights", post(generate_insights))
        .with_state(state)
}
