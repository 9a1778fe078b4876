//! Read models behind the dashboard endpoints.
//!
//! Pure reads over the store. Nothing here triggers generation; records that
//! were never refreshed read as zeroes.

use callsight_core::{
    Agent, AgentId, AgentInsight, AnalyzedCall, CallsightResult, City, CityId, EntityKey,
    EntityType, InsightConfig, MetricSnapshot, QualityTrend, StorageError, Timestamp, Trend,
};
use callsight_storage::InsightStore;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::types::{
    AgentCurrentStats, AgentNarratives, AgentPeriodStats, AgentProfile, AgentSearchResult,
    AgentStats, CallAgentRef, CallAnalysis, CallCityRef, CallReview, CallScores, CityDetails,
    CityInfo, CityMetrics, CityNarratives, CityVolume, EscalationFeed, InsightMetadata,
    LeaderboardEntry, MetricTrend, StateCity, StateSummary, WorstCall,
};

/// Most results returned by agent search.
pub const SEARCH_LIMIT: usize = 20;

pub const NO_CITY_INSIGHT: &str = "No detailed insights available for this city yet.";
pub const NO_ISSUES: &str = "No Issues Reported";

/// Dashboard read models.
#[derive(Clone)]
pub struct DashboardService {
    store: Arc<dyn InsightStore>,
    config: InsightConfig,
}

impl DashboardService {
    pub fn new(store: Arc<dyn InsightStore>, config: InsightConfig) -> Self {
        Self { store, config }
    }

    // ========================================================================
    // AGENTS
    // ========================================================================

    /// All agents by current quality, then lifetime calls.
    pub async fn leaderboard(&self) -> CallsightResult<Vec<LeaderboardEntry>> {
        let agents = self.store.agent_list().await?;
        let insights: HashMap<AgentId, AgentInsight> = self
            .store
            .agent_insight_list()
            .await?
            .into_iter()
            .map(|i| (i.agent_id, i))
            .collect();

        let mut rows: Vec<(Agent, f64, i64, i64)> = agents
            .into_iter()
            .map(|agent| {
                let (score, calls, emergencies) = insights
                    .get(&agent.agent_id)
                    .map(|i| {
                        (
                            i.current.quality_score,
                            i.volume.calls_total,
                            i.volume.emergencies_total,
                        )
                    })
                    .unwrap_or((0.0, 0, 0));
                (agent, score, calls, emergencies)
            })
            .collect();

        rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.2.cmp(&a.2)));

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(idx, (agent, score, calls, emergencies))| LeaderboardEntry {
                rank: idx + 1,
                agent_id: agent.agent_id,
                name: agent.name,
                overall_score: score,
                calls_received: calls,
                emergencies,
            })
            .collect())
    }

    pub async fn search_agents(&self, query: &str) -> CallsightResult<Vec<AgentSearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let agents = self.store.agent_search(query, SEARCH_LIMIT).await?;
        let mut results = Vec::with_capacity(agents.len());
        for agent in agents {
            let overall_score = self
                .store
                .agent_insight_get(agent.agent_id)
                .await?
                .map(|i| i.current.quality_score)
                .unwrap_or(0.0);
            results.push(AgentSearchResult {
                agent_id: agent.agent_id,
                name: agent.name,
                employee_id: agent.employee_id,
                overall_score,
            });
        }
        Ok(results)
    }

    pub async fn agent_stats(&self, id: AgentId) -> CallsightResult<AgentStats> {
        let agent = self
            .store
            .agent_get(id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::Agent, id))?;
        let insight = self
            .store
            .agent_insight_get(id)
            .await?
            .unwrap_or_else(|| AgentInsight::empty(id));

        let current = insight.current;
        let previous = insight.previous.unwrap_or_default();

        Ok(AgentStats {
            agent_profile: AgentProfile {
                id: agent.agent_id,
                name: agent.name,
                employee_id: agent.employee_id,
                languages: agent.languages.into_vec(),
            },
            current_stats: AgentCurrentStats {
                quality_score: current.quality_score,
                sop_compliance: current.sop_compliance_score,
                sentiment_stabilization: current.sentiment_score,
                escalation_rate: current.escalation_rate,
                calls_handled_today: insight.volume.calls_today,
                emergencies_today: insight.volume.emergencies_today,
                calls_handled_total: insight.volume.calls_total,
                total_emergencies_count: insight.volume.emergencies_total,
            },
            previous_month_stats: AgentPeriodStats {
                quality_score: previous.quality_score,
                sop_compliance: previous.sop_compliance_score,
                sentiment_stabilization: previous.sentiment_score,
                escalation_rate: previous.escalation_rate,
                calls_handled: previous.calls,
                emergencies: previous.emergencies,
            },
            trend_data: trend_data(&current, &previous),
            llm_insights: AgentNarratives {
                latest_month_insight: insight.latest_period_insight,
                overall_insight_text: insight.overall_insight,
                latest_change_summary: insight.latest_change_summary,
            },
            insight_metadata: InsightMetadata {
                insight_history: insight.insight_history,
                recent_trend_array: insight.recent_trend,
                last_insight_generated_at: insight.last_insight_generated_at,
                last_updated_at: insight
                    .last_insight_generated_at
                    .map(|_| insight.updated_at),
            },
        })
    }

    // ========================================================================
    // CITIES
    // ========================================================================

    pub async fn cities(&self) -> CallsightResult<Vec<CityInfo>> {
        Ok(self
            .store
            .city_list()
            .await?
            .into_iter()
            .map(CityInfo::from)
            .collect())
    }

    pub async fn city_details(&self, id: CityId) -> CallsightResult<CityDetails> {
        let city = self
            .store
            .city_get(id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::City, id))?;

        let Some(insight) = self.store.city_insight_get(id).await? else {
            return Ok(CityDetails {
                city_info: city.into(),
                metrics: None,
                volume: None,
                llm_insights: None,
                operational_risks: None,
                message: Some(NO_CITY_INSIGHT.to_string()),
            });
        };

        let current = insight.current;
        let previous = insight.previous.unwrap_or_default();

        Ok(CityDetails {
            city_info: city.into(),
            metrics: Some(CityMetrics {
                avg_quality_score: current.quality_score,
                avg_sop_compliance: current.sop_compliance_score,
                avg_sentiment_score: current.sentiment_score,
                avg_escalation_rate: current.escalation_rate,
                prev_month_quality: previous.quality_score,
                prev_month_sop: previous.sop_compliance_score,
                prev_month_sentiment: previous.sentiment_score,
                prev_month_escalation: previous.escalation_rate,
                quality_trend: QualityTrend::between(
                    current.quality_score,
                    previous.quality_score,
                ),
            }),
            volume: Some(CityVolume {
                total_calls_today: insight.volume.calls_today,
                total_emergencies_today: insight.volume.emergencies_today,
                monthly_volume: current.calls,
                prev_monthly_volume: previous.calls,
                volume_growth_pct: growth_pct(current.calls, previous.calls),
            }),
            llm_insights: Some(CityNarratives {
                daily_ops_insight: insight.daily_ops_insight,
                latest_month_insight: insight.latest_month_insight,
                overall_city_insight: insight.overall_city_insight,
                latest_change_summary: insight.latest_change_summary,
                coaching_focus: insight.coaching_focus,
            }),
            operational_risks: Some(insight.operational_risks),
            message: None,
        })
    }

    // ========================================================================
    // DASHBOARD
    // ========================================================================

    /// Cities grouped by state, largest share of call volume first.
    pub async fn state_dashboard(&self) -> CallsightResult<Vec<StateSummary>> {
        let total_calls = self.store.call_count().await?;
        let denominator = total_calls.max(1) as f64;

        let mut states: BTreeMap<String, StateAccumulator> = BTreeMap::new();
        for city in self.store.city_list().await? {
            let Some(state) = city.state.clone() else {
                continue;
            };

            let sop_score = self
                .store
                .city_insight_get(city.city_id)
                .await?
                .map(|i| i.current.sop_compliance_score)
                .unwrap_or(0.0);
            let totals = self.store.call_totals(EntityKey::City(city.city_id)).await?;
            let top_issue = self.store.city_top_issue(city.city_id).await?;

            let acc = states.entry(state).or_default();
            acc.calls += totals.calls;
            acc.sop_scores.push(sop_score);
            if let Some(issue) = top_issue {
                *acc.top_issues.entry(issue).or_insert(0) += 1;
            }
            acc.cities.push(StateCity {
                id: city.city_id,
                name: city.name,
                sop_score: round_to(sop_score, 2),
            });
        }

        let mut summaries: Vec<StateSummary> = states
            .into_iter()
            .map(|(state, acc)| {
                let overall_sop = if acc.sop_scores.is_empty() {
                    0.0
                } else {
                    acc.sop_scores.iter().sum::<f64>() / acc.sop_scores.len() as f64
                };
                StateSummary {
                    state,
                    overall_sop_score: round_to(overall_sop, 2),
                    total_call_volume_pct: round_to(acc.calls as f64 / denominator * 100.0, 1),
                    top_issue: acc.top_issue(),
                    cities: acc.cities,
                }
            })
            .collect();

        summaries.sort_by(|a, b| b.total_call_volume_pct.total_cmp(&a.total_call_volume_pct));
        Ok(summaries)
    }

    /// Escalated calls inside the monitor window, newest first.
    pub async fn recent_escalations(&self) -> CallsightResult<EscalationFeed> {
        self.recent_escalations_at(Utc::now()).await
    }

    pub async fn recent_escalations_at(&self, now: Timestamp) -> CallsightResult<EscalationFeed> {
        let window = self.config.escalation_window();
        let calls = self.store.escalations_since(now - window).await?;

        let mut lookup = RefLookup::default();
        let mut flagged_calls = Vec::with_capacity(calls.len());
        for call in calls {
            if let Some(review) = self.review(call, &mut lookup).await? {
                flagged_calls.push(review);
            }
        }

        Ok(EscalationFeed {
            timestamp: now,
            time_window: window_label(window.num_minutes(), "minutes"),
            count: flagged_calls.len(),
            flagged_calls,
        })
    }

    /// Lowest-quality analyzed call of an agent inside the worst-call window.
    pub async fn worst_call(&self, agent_id: AgentId) -> CallsightResult<WorstCall> {
        if self.store.agent_get(agent_id).await?.is_none() {
            return Err(StorageError::not_found(EntityType::Agent, agent_id).into());
        }

        let now = Utc::now();
        let window = self.config.worst_call_window();
        let worst = self
            .store
            .worst_call_for_agent_since(agent_id, now - window)
            .await?;

        let mut lookup = RefLookup::default();
        let worst_call = match worst {
            Some(call) => self.review(call, &mut lookup).await?,
            None => None,
        };

        Ok(WorstCall {
            timestamp: now,
            time_window: window_label(window.num_days(), "days"),
            agent_id,
            worst_call,
        })
    }

    async fn review(
        &self,
        analyzed: AnalyzedCall,
        lookup: &mut RefLookup,
    ) -> CallsightResult<Option<CallReview>> {
        let AnalyzedCall { call, outcome } = analyzed;
        let Some(outcome) = outcome else {
            return Ok(None);
        };

        let agent = match call.agent_id {
            Some(id) => lookup.agent(self.store.as_ref(), id).await?,
            None => None,
        };
        let city = match call.city_id {
            Some(id) => lookup.city(self.store.as_ref(), id).await?,
            None => None,
        };

        let scores = outcome.scores;
        Ok(Some(CallReview {
            call_id: call.call_id,
            call_timestamp: call.call_timestamp,
            audio_url: call.audio_url,
            duration_seconds: call.duration_seconds,
            processing_status: call.processing_status,
            primary_issue_category: call.primary_issue_category,
            customer_preferred_language: call.customer_preferred_language,
            agent: CallAgentRef {
                agent_id: agent.as_ref().map(|a| a.agent_id),
                name: agent
                    .as_ref()
                    .map(|a| a.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                employee_id: agent.map(|a| a.employee_id),
            },
            city: CallCityRef {
                city_id: city.as_ref().map(|c| c.city_id),
                name: city
                    .as_ref()
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                state: city.and_then(|c| c.state),
            },
            scores: CallScores {
                sop_compliance: scores.sop_compliance,
                conversation_control: scores.conversation_control,
                communication: scores.communication,
                sentiment_stabilization: scores.sentiment_stabilization,
                resolution_validity: scores.resolution_validity,
                overall_quality: scores.overall_quality,
                coaching_priority: scores.coaching_priority,
            },
            analysis: CallAnalysis {
                business_insight: outcome.business_insight,
                coaching_insight: outcome.coaching_insight,
                escalation_flagged: outcome.escalation.is_flagged(),
                why_flagged: outcome.escalation.reason().map(str::to_string),
                language_spoken: outcome.language_spoken,
            },
            sop_deviations: or_empty_list(outcome.sop_deviations),
            issue_analysis: or_empty_object(outcome.issue_analysis),
            resolution_analysis: or_empty_object(outcome.resolution_analysis),
            sentiment_trajectory: or_empty_list(outcome.sentiment_trajectory),
        }))
    }
}

impl std::fmt::Debug for DashboardService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

#[derive(Default)]
struct StateAccumulator {
    calls: i64,
    sop_scores: Vec<f64>,
    top_issues: HashMap<String, usize>,
    cities: Vec<StateCity>,
}

impl StateAccumulator {
    /// Most frequent per-city top issue; ties go to the alphabetically first.
    fn top_issue(&self) -> String {
        self.top_issues
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(issue, _)| issue.clone())
            .unwrap_or_else(|| NO_ISSUES.to_string())
    }
}

/// Agents and cities already fetched while building one response.
#[derive(Default)]
struct RefLookup {
    agents: HashMap<AgentId, Option<Agent>>,
    cities: HashMap<CityId, Option<City>>,
}

impl RefLookup {
    async fn agent(
        &mut self,
        store: &dyn InsightStore,
        id: AgentId,
    ) -> CallsightResult<Option<Agent>> {
        if let Some(hit) = self.agents.get(&id) {
            return Ok(hit.clone());
        }
        let agent = store.agent_get(id).await?;
        self.agents.insert(id, agent.clone());
        Ok(agent)
    }

    async fn city(&mut self, store: &dyn InsightStore, id: CityId) -> CallsightResult<Option<City>> {
        if let Some(hit) = self.cities.get(&id) {
            return Ok(hit.clone());
        }
        let city = store.city_get(id).await?;
        self.cities.insert(id, city.clone());
        Ok(city)
    }
}

fn trend_data(current: &MetricSnapshot, previous: &MetricSnapshot) -> Vec<MetricTrend> {
    [
        ("quality_score", current.quality_score, previous.quality_score),
        (
            "sop_compliance",
            current.sop_compliance_score,
            previous.sop_compliance_score,
        ),
        (
            "sentiment_stabilization",
            current.sentiment_score,
            previous.sentiment_score,
        ),
        ("escalation_rate", current.escalation_rate, previous.escalation_rate),
    ]
    .into_iter()
    .map(|(metric, value, prev_value)| MetricTrend {
        metric: metric.to_string(),
        trend: Trend::between(value, prev_value),
        value,
        prev_value,
    })
    .collect()
}

/// Percent change from `previous` to `current`, one decimal. Zero when there
/// is no previous volume.
pub fn growth_pct(current: i64, previous: i64) -> f64 {
    if previous <= 0 {
        return 0.0;
    }
    round_to((current - previous) as f64 / previous as f64 * 100.0, 1)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn window_label(amount: i64, unit: &str) -> String {
    format!("last_{}_{}", amount, unit)
}

fn or_empty_list(value: serde_json::Value) -> serde_json::Value {
    if value.is_null() {
        serde_json::Value::Array(Vec::new())
    } else {
        value
    }
}

fn or_empty_object(value: serde_json::Value) -> serde_json::Value {
    if value.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        value
    }
}
