//! OpenAPI Specification for the Callsight API
//!
//! The document is generated by utoipa from the route annotations and the
//! response types, and served at `/openapi.json`.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{HealthResponse, HealthStatus, StoreHealth};
use crate::routes::{agent, calls, city, dashboard, health, ingest};
use crate::types::*;

use callsight_core::{
    Agent, AgentInsight, CallContext, City, CityInsight, EntityType, InsightHistoryEntry,
    Languages, MetricSnapshot, ProcessingStatus, QualityTrend, Trend, VolumeCounters,
};

/// OpenAPI document for the Callsight API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Callsight API",
        version = "0.4.0",
        description = "Call-center insight aggregation: leaderboards, drill-downs, escalation monitoring and cached narrative insights",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local Development")
    ),
    tags(
        (name = "Agents", description = "Agent leaderboard, search, drill-down and insight refresh"),
        (name = "Cities", description = "City drill-down and insight refresh"),
        (name = "Dashboard", description = "State roll-up and escalation monitor"),
        (name = "Calls", description = "Call ingestion and analysis processing"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === Agent Routes ===
        agent::leaderboard,
        agent::search_agents,
        agent::agent_stats,
        agent::worst_call,
        agent::generate_insights,

        // === City Routes ===
        city::list_cities,
        city::city_details,
        city::generate_insights,

        // === Dashboard Routes ===
        dashboard::state_dashboard,
        dashboard::recent_escalations,

        // === Call Routes ===
        ingest::ingest_call,
        calls::process_call,
        calls::call_status,

        // === Health ===
        health::ping,
        health::liveness,
        health::readiness,

        crate::telemetry::metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,

            // === Agent Types ===
            LeaderboardEntry, AgentSearchResult, AgentProfile, AgentCurrentStats,
            AgentPeriodStats, MetricTrend, AgentNarratives, InsightMetadata, AgentStats,

            // === City Types ===
            CityInfo, CityMetrics, CityVolume, CityNarratives, CityDetails,

            // === Dashboard Types ===
            StateCity, StateSummary, CallAgentRef, CallCityRef, CallScores, CallAnalysis,
            CallReview, EscalationFeed, WorstCall,

            // === Call Types ===
            MediaInfo, IngestResponse, IngestForm, CallStatusResponse,

            // === Health Types ===
            HealthResponse, HealthStatus, StoreHealth,

            // === Core Domain Types ===
            EntityType, CallContext, ProcessingStatus, Trend, QualityTrend,
            Agent, Languages, City, AgentInsight, CityInsight, MetricSnapshot,
            VolumeCounters, InsightHistoryEntry
        )
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Serialize the document as pretty-printed JSON.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
