//! Liveness and readiness probes, mounted under `/health`.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::db::DbClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Body of `/health/live` and `/health/ready`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreHealth>,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Result of probing the insight store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoreHealth {
    /// `postgres` or `memory`
    pub backend: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreHealth {
    /// The in-memory backend has nothing to reach and is always ready.
    async fn probe(db: Option<&DbClient>) -> Self {
        let Some(db) = db else {
            return Self {
                backend: "memory".to_string(),
                status: HealthStatus::Healthy,
                latency_ms: None,
                error: None,
            };
        };

        let started = Instant::now();
        let (status, latency_ms, error) = match db.health_check().await {
            Ok(()) => (
                HealthStatus::Healthy,
                Some(started.elapsed().as_millis() as u64),
                None,
            ),
            Err(err) => (HealthStatus::Unhealthy, None, Some(err.message)),
        };
        Self {
            backend: "postgres".to_string(),
            status,
            latency_ms,
            error,
        }
    }
}

#[derive(Clone)]
pub struct HealthProbe {
    db: Option<DbClient>,
    started: Instant,
}

impl HealthProbe {
    fn respond(&self, status: HealthStatus, store: Option<StoreHealth>) -> HealthResponse {
        HealthResponse {
            status,
            store,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses((status = 200, description = "Service is responding", body = String)),
)]
pub async fn ping() -> &'static str {
    "pong"
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses((status = 200, description = "Process is alive", body = HealthResponse)),
)]
pub async fn liveness(State(probe): State<HealthProbe>) -> Json<HealthResponse> {
    Json(probe.respond(HealthStatus::Healthy, None))
}

/// Ready when the configured store answers.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Store is reachable", body = HealthResponse),
        (status = 503, description = "Store is unreachable", body = HealthResponse),
    ),
)]
pub async fn readiness(State(probe): State<HealthProbe>) -> (StatusCode, Json<HealthResponse>) {
    let store = StoreHealth::probe(probe.db.as_ref()).await;
    let status = store.status;
    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => {
            tracing::warn!(error = ?store.error, "Readiness probe failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (code, Json(probe.respond(status, Some(store))))
}

pub fn create_router(db: Option<DbClient>, started: Instant) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(HealthProbe { db, started })
}
