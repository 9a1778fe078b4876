//! API Request and Response Types
//!
//! Every JSON body leaves the server wrapped in [`ApiResponse`]; the error
//! envelope lives in `crate::error`.

use callsight_core::{
    AgentId, CallContext, CallId, CityId, InsightHistoryEntry, ProcessingStatus, QualityTrend,
    Timestamp, Trend,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// ENVELOPE
// ============================================================================

/// Success envelope: `{ "status": "success", "data": …, "message"? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            data,
            message: Some(message.into()),
        }
    }
}

// ============================================================================
// AGENT TYPES
// ============================================================================

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LeaderboardEntry {
    pub rank: usize,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub name: String,
    pub overall_score: f64,
    pub calls_received: i64,
    pub emergencies: i64,
}

/// Query string for agent search.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct AgentSearchQuery {
    /// Substring of the agent's name or employee code
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentSearchResult {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub name: String,
    pub employee_id: String,
    pub overall_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentProfile {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: AgentId,
    pub name: String,
    pub employee_id: String,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentCurrentStats {
    pub quality_score: f64,
    pub sop_compliance: f64,
    pub sentiment_stabilization: f64,
    pub escalation_rate: f64,
    pub calls_handled_today: i64,
    pub emergencies_today: i64,
    pub calls_handled_total: i64,
    pub total_emergencies_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentPeriodStats {
    pub quality_score: f64,
    pub sop_compliance: f64,
    pub sentiment_stabilization: f64,
    pub escalation_rate: f64,
    pub calls_handled: i64,
    pub emergencies: i64,
}

/// Current vs previous value for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MetricTrend {
    pub metric: String,
    pub trend: Trend,
    pub value: f64,
    pub prev_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentNarratives {
    pub latest_month_insight: Option<String>,
    pub overall_insight_text: Option<String>,
    pub latest_change_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InsightMetadata {
    pub insight_history: Vec<InsightHistoryEntry>,
    pub recent_trend_array: Vec<f64>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_insight_generated_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_updated_at: Option<Timestamp>,
}

/// Agent drill-down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentStats {
    pub agent_profile: AgentProfile,
    pub current_stats: AgentCurrentStats,
    pub previous_month_stats: AgentPeriodStats,
    pub trend_data: Vec<MetricTrend>,
    pub llm_insights: AgentNarratives,
    pub insight_metadata: InsightMetadata,
}

// ============================================================================
// CITY TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CityInfo {
    pub id: CityId,
    pub name: String,
    pub state: Option<String>,
}

impl From<callsight_core::City> for CityInfo {
    fn from(city: callsight_core::City) -> Self {
        Self {
            id: city.city_id,
            name: city.name,
            state: city.state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CityMetrics {
    pub avg_quality_score: f64,
    pub avg_sop_compliance: f64,
    pub avg_sentiment_score: f64,
    pub avg_escalation_rate: f64,
    pub prev_month_quality: f64,
    pub prev_month_sop: f64,
    pub prev_month_sentiment: f64,
    pub prev_month_escalation: f64,
    pub quality_trend: QualityTrend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CityVolume {
    pub total_calls_today: i64,
    pub total_emergencies_today: i64,
    pub monthly_volume: i64,
    pub prev_monthly_volume: i64,
    pub volume_growth_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CityNarratives {
    pub daily_ops_insight: Option<String>,
    pub latest_month_insight: Option<String>,
    pub overall_city_insight: Option<String>,
    pub latest_change_summary: Option<String>,
    pub coaching_focus: Option<String>,
}

/// City drill-down. Metric sections are absent until the city's first
/// refresh, in which case `message` explains why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CityDetails {
    pub city_info: CityInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<CityMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<CityVolume>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_insights: Option<CityNarratives>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operational_risks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// DASHBOARD TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StateCity {
    pub id: CityId,
    pub name: String,
    pub sop_score: f64,
}

/// One state on the national dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StateSummary {
    pub state: String,
    pub overall_sop_score: f64,
    pub total_call_volume_pct: f64,
    pub top_issue: String,
    pub cities: Vec<StateCity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CallAgentRef {
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub agent_id: Option<AgentId>,
    pub name: String,
    pub employee_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CallCityRef {
    pub city_id: Option<CityId>,
    pub name: String,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CallScores {
    pub sop_compliance: f64,
    pub conversation_control: f64,
    pub communication: f64,
    pub sentiment_stabilization: f64,
    pub resolution_validity: f64,
    pub overall_quality: f64,
    pub coaching_priority: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CallAnalysis {
    pub business_insight: Option<String>,
    pub coaching_insight: Option<String>,
    pub escalation_flagged: bool,
    pub why_flagged: Option<String>,
    pub language_spoken: Option<String>,
}

/// A call with its analysis, as shown on the escalation monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CallReview {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub call_id: CallId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub call_timestamp: Timestamp,
    pub audio_url: String,
    pub duration_seconds: i32,
    pub processing_status: ProcessingStatus,
    pub primary_issue_category: Option<String>,
    pub customer_preferred_language: Option<String>,
    pub agent: CallAgentRef,
    pub city: CallCityRef,
    pub scores: CallScores,
    pub analysis: CallAnalysis,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub sop_deviations: serde_json::Value,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub issue_analysis: serde_json::Value,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub resolution_analysis: serde_json::Value,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub sentiment_trajectory: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EscalationFeed {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    pub time_window: String,
    pub count: usize,
    pub flagged_calls: Vec<CallReview>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WorstCall {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub timestamp: Timestamp,
    pub time_window: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub worst_call: Option<CallReview>,
}

// ============================================================================
// INSIGHT REFRESH TYPES
// ============================================================================

/// Result of a `generate-insights` trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RefreshResponse<T> {
    /// `cached` or `generated`
    pub source: String,
    /// Why the record was or was not regenerated
    pub reason: String,
    pub insight: T,
}

// ============================================================================
// CALL TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MediaInfo {
    pub filename: String,
    pub duration_seconds: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub call_id: CallId,
    pub media_info: MediaInfo,
}

/// Multipart form accepted by `POST /ingest`. Documentation only; the
/// handler reads fields as they stream in.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IngestForm {
    /// MP3 recording
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Binary))]
    pub file: Vec<u8>,
    /// Agent UUID, employee code or name
    pub agent_identifier: String,
    pub issue_category: String,
    /// Numeric city id or city name
    pub city_identifier: String,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub call_context: Option<CallContext>,
    pub agent_manual_note: Option<String>,
    pub customer_preferred_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CallStatusResponse {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub call_id: CallId,
    pub processing_status: ProcessingStatus,
    pub audio_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(ApiResponse::ok(vec![1, 2]))?;
        assert_eq!(json, serde_json::json!({"status": "success", "data": [1, 2]}));

        let json = serde_json::to_value(ApiResponse::with_message((), "queued"))?;
        assert_eq!(json["message"], "queued");
        Ok(())
    }

    #[test]
    fn test_city_details_without_insight_omits_sections() -> Result<(), serde_json::Error> {
        let details = CityDetails {
            city_info: CityInfo {
                id: 3,
                name: "Pune".to_string(),
                state: Some("Maharashtra".to_string()),
            },
            metrics: None,
            volume: None,
            llm_insights: None,
            operational_risks: None,
            message: Some("No detailed insights available for this city yet.".to_string()),
        };
        let json = serde_json::to_value(details)?;
        assert!(json.get("metrics").is_none());
        assert_eq!(json["city_info"]["name"], "Pune");
        Ok(())
    }
}
