//! Insight records aggregated per agent and per city

use crate::{AgentId, CityId, Timestamp};
use serde::{Deserialize, Serialize};

/// Rolling-window metrics for one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MetricSnapshot {
    pub quality_score: f64,
    pub sop_compliance_score: f64,
    pub sentiment_score: f64,
    pub escalation_rate: f64,
    pub calls: i64,
    pub emergencies: i64,
}

/// Volume counters for today and for the entity's whole history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VolumeCounters {
    pub calls_today: i64,
    pub emergencies_today: i64,
    pub calls_total: i64,
    pub emergencies_total: i64,
}

/// One generation run, kept for the insight timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct InsightHistoryEntry {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub generated_at: Timestamp,
    pub period_insight: String,
    pub change_summary: Option<String>,
    pub quality_score: f64,
}

/// Append `entry`, dropping the oldest items beyond `cap`.
pub fn push_bounded<T>(items: &mut Vec<T>, entry: T, cap: usize) {
    items.push(entry);
    if items.len() > cap {
        let overflow = items.len() - cap;
        items.drain(..overflow);
    }
}

/// Insight record for an agent. Created lazily by the first refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentInsight {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub agent_id: AgentId,
    pub current: MetricSnapshot,
    pub previous: Option<MetricSnapshot>,
    pub volume: VolumeCounters,
    pub latest_period_insight: Option<String>,
    /// Cumulative narrative folded forward by every refresh.
    pub overall_insight: Option<String>,
    pub latest_change_summary: Option<String>,
    pub insight_history: Vec<InsightHistoryEntry>,
    /// Quality scores from the most recent refreshes, oldest first.
    pub recent_trend: Vec<f64>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub metrics_computed_at: Option<Timestamp>,
    /// Staleness clock.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_insight_generated_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl AgentInsight {
    pub fn empty(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            current: MetricSnapshot::default(),
            previous: None,
            volume: VolumeCounters::default(),
            latest_period_insight: None,
            overall_insight: None,
            latest_change_summary: None,
            insight_history: Vec::new(),
            recent_trend: Vec::new(),
            metrics_computed_at: None,
            last_insight_generated_at: None,
            updated_at: chrono::Utc::now(),
        }
    }
}

/// Insight record for a city. Created lazily by the first refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CityInsight {
    pub city_id: CityId,
    pub current: MetricSnapshot,
    pub previous: Option<MetricSnapshot>,
    pub volume: VolumeCounters,
    pub daily_ops_insight: Option<String>,
    pub latest_month_insight: Option<String>,
    pub overall_city_insight: Option<String>,
    pub latest_change_summary: Option<String>,
    /// Regenerated at most once per local calendar month.
    pub coaching_focus: Option<String>,
    pub operational_risks: Vec<String>,
    pub insight_history: Vec<InsightHistoryEntry>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub metrics_computed_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_insight_generated_at: Option<Timestamp>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl CityInsight {
    pub fn empty(city_id: CityId) -> Self {
        Self {
            city_id,
            current: MetricSnapshot::default(),
            previous: None,
            volume: VolumeCounters::default(),
            daily_ops_insight: None,
            latest_month_insight: None,
            overall_city_insight: None,
            latest_change_summary: None,
            coaching_focus: None,
            operational_risks: Vec::new(),
            insight_history: Vec::new(),
            metrics_computed_at: None,
            last_insight_generated_at: None,
            updated_at: chrono::Utc::now(),
        }
    }
}
