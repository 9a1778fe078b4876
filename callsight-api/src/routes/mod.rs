//! REST API Routes Module
//!
//! Route handlers grouped by the dashboard surface they serve:
//! - Agent leaderboard, search, drill-down and insight refresh
//! - City list, drill-down and insight refresh
//! - State dashboard and escalation monitor
//! - Call ingestion and processing
//! - Health checks (Kubernetes-compatible), metrics and the OpenAPI document

pub mod agent;
pub mod calls;
pub mod city;
pub mod dashboard;
pub mod health;
pub mod ingest;

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use agent::create_router as agent_router;
pub use calls::create_router as calls_router;
pub use city::create_router as city_router;
pub use dashboard::create_router as dashboard_router;
pub use health::create_router as health_router;
pub use ingest::create_router as ingest_router;

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// Create the complete API router.
///
/// - Dashboard reads and insight triggers under /api/*
/// - Call ingestion at /ingest
/// - Health checks at /health/*
/// - Metrics at /metrics (when enabled)
/// - OpenAPI spec at /openapi.json
///
/// Execution order: CORS -> Observability -> Handler
pub fn create_api_router(state: AppState, metrics_enabled: bool) -> Router {
    let config = state.config.clone();

    let api_routes = Router::new()
        .nest("/agents", agent::create_router(state.clone()))
        .nest("/cities", city::create_router(state.clone()))
        .nest("/dashboard", dashboard::create_router(state.clone()))
        .nest("/escalations", dashboard::create_escalation_router(state.clone()))
        .nest("/calls", calls::create_router(state.clone()));

    let mut router = Router::new()
        .nest("/api", api_routes)
        .merge(
            ingest::create_router(state.clone())
                .layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .nest("/health", health::create_router(state.db.clone(), state.start_time))
        .route("/openapi.json", get(openapi_json));

    if metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(from_fn(observability_middleware))
        .layer(build_cors_layer(&config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let mut config = ApiConfig::default();
        let _ = build_cors_layer(&config);

        config.cors_origins = vec!["https://ops.callsight.in".to_string()];
        config.cors_allow_credentials = true;
        let _ = build_cors_layer(&config);
    }
}
