//! Agent REST API Routes
//!
//! Leaderboard, search, drill-down, worst call and insight refresh.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use callsight_core::{AgentId, AgentInsight};
use callsight_insights::InsightPipeline;

use crate::{
    error::{ApiError, ApiResult},
    extractors::PathId,
    services::DashboardService,
    state::AppState,
    telemetry::METRICS,
    types::{
        AgentSearchQuery, AgentSearchResult, AgentStats, ApiResponse, LeaderboardEntry,
        RefreshResponse, WorstCall,
    },
};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/agents/leaderboard - All agents ranked by current quality
#[utoipa::path(
    get,
    path = "/api/agents/leaderboard",
    tag = "Agents",
    responses(
        (status = 200, description = "Agents ranked by quality, then lifetime volume", body = Vec<LeaderboardEntry>),
        (status = 500, description = "Internal server error", body = ApiError),
    ),
)]
pub async fn leaderboard(
    State(dashboard): State<DashboardService>,
) -> ApiResult<impl IntoResponse> {
    let rows = dashboard.leaderboard().await?;
    Ok(Json(ApiResponse::ok(rows)))
}

/// GET /api/agents/search?query= - Search agents by name or employee code
#[utoipa::path(
    get,
    path = "/api/agents/search",
    tag = "Agents",
    params(AgentSearchQuery),
    responses(
        (status = 200, description = "At most 20 matching agents", body = Vec<AgentSearchResult>),
        (status = 500, description = "Internal server error", body = ApiError),
    ),
)]
pub async fn search_agents(
    State(dashboard): State<DashboardService>,
    Query(params): Query<AgentSearchQuery>,
) -> ApiResult<impl IntoResponse> {
    let results = dashboard.search_agents(&params.query).await?;
    Ok(Json(ApiResponse::ok(results)))
}

/// GET /api/agents/{id}/stats - Agent drill-down
#[utoipa::path(
    get,
    path = "/api/agents/{id}/stats",
    tag = "Agents",
    params(("id" = String, Path, description = "Agent ID", format = "uuid")),
    responses(
        (status = 200, description = "Profile, metrics, trends and narratives", body = AgentStats),
        (status = 400, description = "Malformed agent id", body = ApiError),
        (status = 404, description = "Agent not found", body = ApiError),
    ),
)]
pub async fn agent_stats(
    State(dashboard): State<DashboardService>,
    PathId(agent_id): PathId<AgentId>,
) -> ApiResult<impl IntoResponse> {
    let stats = dashboard.agent_stats(agent_id).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

/// GET /api/agents/{id}/worst-call - Lowest-quality call of the last 7 days
#[utoipa::path(
    get,
    path = "/api/agents/{id}/worst-call",
    tag = "Agents",
    params(("id" = String, Path, description = "Agent ID", format = "uuid")),
    responses(
        (status = 200, description = "Worst call, or null when the agent had no analyzed calls", body = WorstCall),
        (status = 404, description = "Agent not found", body = ApiError),
    ),
)]
pub async fn worst_call(
    State(dashboard): State<DashboardService>,
    PathId(agent_id): PathId<AgentId>,
) -> ApiResult<impl IntoResponse> {
    let worst = dashboard.worst_call(agent_id).await?;
    let response = if worst.worst_call.is_none() {
        ApiResponse::with_message(worst, "No calls found for this agent in the past week")
    } else {
        ApiResponse::ok(worst)
    };
    Ok(Json(response))
}

/// POST /api/agents/{id}/generate-insights - Refresh the agent's insight
#[utoipa::path(
    post,
    path = "/api/agents/{id}/generate-insights",
    tag = "Agents",
    params(("id" = String, Path, description = "Agent ID", format = "uuid")),
    responses(
        (status = 200, description = "Insight served from cache or regenerated", body = RefreshResponse<AgentInsight>),
        (status = 404, description = "Agent not found", body = ApiError),
        (status = 500, description = "Insight generation failed", body = ApiError),
    ),
)]
pub async fn generate_insights(
    State(pipeline): State<InsightPipeline>,
    PathId(agent_id): PathId<AgentId>,
) -> ApiResult<impl IntoResponse> {
    let report = pipeline.refresh_agent(agent_id).await.map_err(|e| {
        record_refresh("error");
        e
    })?;
    record_refresh(report.decision.label());

    let message = if report.decision.is_cached() {
        "Returning cached insights"
    } else {
        "Insights generated successfully"
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
        m.record_refresh("agent", outcome);
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the agent router, mounted under `/api/agents`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/leaderboard", get(leaderboard))
        .route("/search", get(search_agents))
        .route("/:id/stats", get(agent_stats))
        .route("/:id/worst-call", get(worst_call))
        .route("/:id/generate-insights", post(generate_insights))
        .with_state(state)
}
