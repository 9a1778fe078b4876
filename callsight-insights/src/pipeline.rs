//! Aggregation pipeline.
//!
//! `refresh` for one entity runs under that entity's lock:
//!
//! 1. resolve the entity (`NotFound` if absent)
//! 2. load the stored insight and probe for recent activity
//! 3. decide; a cached answer returns without writing
//! 4. fetch the trailing window and roll up metrics
//! 5. generate period narratives one slot at a time, then merge
//! 6. persist everything with a single upsert
//!
//! Nothing is written until step 6, so a failure anywhere earlier leaves
//! the stored insight untouched. An empty window skips generation and
//! writes placeholder text instead.

use crate::corpus;
use crate::decision::{coaching_gate, decide, CoachingDecision, RefreshDecision};
use crate::metrics;
use callsight_core::{
    push_bounded, AgentId, AgentInsight, CallsightResult, CityId, CityInsight, EntityKey,
    EntityType, InsightConfig, InsightHistoryEntry, LlmError, StorageError, Timestamp,
};
use callsight_llm::{MergeSubject, NarrativeEngine, PeriodSlot};
use callsight_storage::{EntityLocks, InsightStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

// ============================================================================
// PLACEHOLDERS
// ============================================================================

pub const AGENT_NO_CALLS: &str = "No calls recorded for this month.";
pub const NO_ACTIVITY_SUMMARY: &str = "No activity to analyze.";
pub const CITY_NO_CALLS_TODAY: &str = "No calls recorded today for operational analysis.";
pub const CITY_NO_CALLS_MONTH: &str = "No calls recorded in the last 30 days.";
pub const CITY_NO_HISTORY: &str = "No operational history available yet.";
pub const CITY_NO_COACHING_DATA: &str = "No sufficient data for coaching analysis.";
pub const CITY_NO_COACHING_INSIGHTS: &str = "No coaching insights available to analyze.";

// ============================================================================
// REPORTS
// ============================================================================

/// Where the narratives in a refresh report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshSource {
    /// Stored insight served as-is; nothing written.
    Cached,
    /// Narratives generated by the text model.
    Generated,
    /// Window was empty; placeholder text written without a model call.
    Placeholder,
}

impl RefreshSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshSource::Cached => "cached",
            RefreshSource::Generated => "generated",
            RefreshSource::Placeholder => "placeholder",
        }
    }
}

/// Result of one refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshReport<T> {
    pub decision: RefreshDecision,
    pub source: RefreshSource,
    pub insight: T,
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Refreshes agent and city insights.
#[derive(Clone)]
pub struct InsightPipeline {
    store: Arc<dyn InsightStore>,
    engine: Arc<NarrativeEngine>,
    locks: EntityLocks,
    config: InsightConfig,
}

impl InsightPipeline {
    pub fn new(
        store: Arc<dyn InsightStore>,
        engine: Arc<NarrativeEngine>,
        config: InsightConfig,
    ) -> Self {
        Self {
            store,
            engine,
            locks: EntityLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    pub async fn refresh_agent(&self, id: AgentId) -> CallsightResult<RefreshReport<AgentInsight>> {
        self.refresh_agent_at(id, Utc::now()).await
    }

    pub async fn refresh_city(&self, id: CityId) -> CallsightResult<RefreshReport<CityInsight>> {
        self.refresh_city_at(id, Utc::now()).await
    }

    /// Refresh an agent's insight as of `now`.
    #[tracing::instrument(skip_all, fields(agent_id = %id))]
    pub async fn refresh_agent_at(
        &self,
        id: AgentId,
        now: Timestamp,
    ) -> CallsightResult<RefreshReport<AgentInsight>> {
        let agent = self
            .store
            .agent_get(id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::Agent, id))?;

        let key = EntityKey::Agent(id);
        let _guard = self.locks.acquire(key).await;

        let existing = self.store.agent_insight_get(id).await?;
        let decision = self
            .decide(key, existing.as_ref().and_then(|i| i.last_insight_generated_at), now)
            .await?;

        if let (RefreshDecision::ServeCached, Some(insight)) = (decision, existing.as_ref()) {
            tracing::debug!("Agent insight served from cache");
            return Ok(RefreshReport {
                decision,
                source: RefreshSource::Cached,
                insight: insight.clone(),
            });
        }

        let offset = self.config.local_offset();
        let calls = self
            .store
            .calls_for_agent_since(id, now - self.config.lookback())
            .await?;
        let totals = self.store.call_totals(key).await?;
        let snapshot = metrics::snapshot(&calls);
        let volume = metrics::volume(&calls, totals, now, offset);
        let previous_overall = existing.as_ref().and_then(|i| i.overall_insight.clone());

        let (source, period, overall, change_summary) = if calls.is_empty() {
            tracing::info!("No calls in window; writing placeholders");
            (
                RefreshSource::Placeholder,
                AGENT_NO_CALLS.to_string(),
                previous_overall,
                NO_ACTIVITY_SUMMARY.to_string(),
            )
        } else {
            let lines = corpus::agent_lines(&calls, offset);
            let period = self
                .summarize(PeriodSlot::AgentMonthly, &agent.name, &lines)
                .await?;
            let merged = self
                .engine
                .merge(MergeSubject::Agent, previous_overall.as_deref(), &period)
                .await;
            (
                RefreshSource::Generated,
                period,
                merged.overall,
                merged.change_summary,
            )
        };

        let history_limit = self.config.history_limit;
        let insight = self
            .store
            .agent_insight_upsert(
                id,
                Box::new(move |record: &mut AgentInsight| {
                    record.previous = metrics::rolled_previous(
                        &record.current,
                        record.previous,
                        record.metrics_computed_at,
                        now,
                        offset,
                    );
                    record.current = snapshot;
                    record.volume = volume;
                    record.metrics_computed_at = Some(now);

                    if source == RefreshSource::Generated {
                        push_bounded(
                            &mut record.insight_history,
                            InsightHistoryEntry {
                                generated_at: now,
                                period_insight: period.clone(),
                                change_summary: Some(change_summary.clone()),
                                quality_score: snapshot.quality_score,
                            },
                            history_limit,
                        );
                    }
                    push_bounded(&mut record.recent_trend, snapshot.quality_score, history_limit);

                    record.latest_period_insight = Some(period);
                    record.overall_insight = overall;
                    record.latest_change_summary = Some(change_summary);
                    record.last_insight_generated_at = Some(now);
                }),
            )
            .await?;

        tracing::info!(
            source = source.as_str(),
            reason = decision.label(),
            calls = snapshot.calls,
            "Agent insight refreshed"
        );

        Ok(RefreshReport {
            decision,
            source,
            insight,
        })
    }

    /// Refresh a city's insight as of `now`.
    #[tracing::instrument(skip_all, fields(city_id = id))]
    pub async fn refresh_city_at(
        &self,
        id: CityId,
        now: Timestamp,
    ) -> CallsightResult<RefreshReport<CityInsight>> {
        let city = self
            .store
            .city_get(id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::City, id))?;

        let key = EntityKey::City(id);
        let _guard = self.locks.acquire(key).await;

        let existing = self.store.city_insight_get(id).await?;
        let last_generated = existing.as_ref().and_then(|i| i.last_insight_generated_at);
        let decision = self.decide(key, last_generated, now).await?;

        if let (RefreshDecision::ServeCached, Some(insight)) = (decision, existing.as_ref()) {
            tracing::debug!("City insight served from cache");
            return Ok(RefreshReport {
                decision,
                source: RefreshSource::Cached,
                insight: insight.clone(),
            });
        }

        let offset = self.config.local_offset();
        let calls = self
            .store
            .calls_for_city_since(id, now - self.config.lookback())
            .await?;
        let totals = self.store.call_totals(key).await?;
        let snapshot = metrics::snapshot(&calls);
        let volume = metrics::volume(&calls, totals, now, offset);
        let risks = metrics::operational_risks(&calls);

        let previous_overall = existing.as_ref().and_then(|i| i.overall_city_insight.clone());
        let existing_coaching = existing.as_ref().and_then(|i| i.coaching_focus.clone());
        let coaching = coaching_gate(existing_coaching.as_deref(), last_generated, now, offset);

        let narratives = if calls.is_empty() {
            tracing::info!("No calls in window; writing placeholders");
            CityNarratives {
                source: RefreshSource::Placeholder,
                daily: CITY_NO_CALLS_TODAY.to_string(),
                monthly: CITY_NO_CALLS_MONTH.to_string(),
                overall: Some(previous_overall.unwrap_or_else(|| CITY_NO_HISTORY.to_string())),
                change_summary: NO_ACTIVITY_SUMMARY.to_string(),
                coaching: match coaching {
                    CoachingDecision::Regenerate => Some(CITY_NO_COACHING_DATA.to_string()),
                    CoachingDecision::CarryForward => existing_coaching,
                },
            }
        } else {
            let day_start = metrics::local_day_start(now, offset);
            let today: Vec<_> = calls
                .iter()
                .filter(|c| c.call.call_timestamp >= day_start)
                .collect();

            let daily = if today.is_empty() {
                CITY_NO_CALLS_TODAY.to_string()
            } else {
                let lines = corpus::city_daily_lines(today.iter().copied());
                self.summarize(PeriodSlot::CityDailyOps, &city.name, &lines)
                    .await?
            };

            let lines = corpus::city_monthly_lines(&calls);
            let monthly = self
                .summarize(PeriodSlot::CityMonthly, &city.name, &lines)
                .await?;

            let merged = self
                .engine
                .merge(MergeSubject::City, previous_overall.as_deref(), &monthly)
                .await;

            let coaching = match coaching {
                CoachingDecision::CarryForward => {
                    tracing::debug!("Coaching focus already generated this month");
                    existing_coaching
                }
                CoachingDecision::Regenerate => {
                    let lines = corpus::city_coaching_lines(&calls);
                    if lines.is_empty() {
                        Some(CITY_NO_COACHING_INSIGHTS.to_string())
                    } else {
                        Some(
                            self.summarize(PeriodSlot::CityCoaching, &city.name, &lines)
                                .await?,
                        )
                    }
                }
            };

            CityNarratives {
                source: RefreshSource::Generated,
                daily,
                monthly,
                overall: merged.overall,
                change_summary: merged.change_summary,
                coaching,
            }
        };

        let source = narratives.source;
        let history_limit = self.config.history_limit;
        let insight = self
            .store
            .city_insight_upsert(
                id,
                Box::new(move |record: &mut CityInsight| {
                    record.previous = metrics::rolled_previous(
                        &record.current,
                        record.previous,
                        record.metrics_computed_at,
                        now,
                        offset,
                    );
                    record.current = snapshot;
                    record.volume = volume;
                    record.operational_risks = risks;
                    record.metrics_computed_at = Some(now);

                    if narratives.source == RefreshSource::Generated {
                        push_bounded(
                            &mut record.insight_history,
                            InsightHistoryEntry {
                                generated_at: now,
                                period_insight: narratives.monthly.clone(),
                                change_summary: Some(narratives.change_summary.clone()),
                                quality_score: snapshot.quality_score,
                            },
                            history_limit,
                        );
                    }

                    record.daily_ops_insight = Some(narratives.daily);
                    record.latest_month_insight = Some(narratives.monthly);
                    record.overall_city_insight = narratives.overall;
                    record.latest_change_summary = Some(narratives.change_summary);
                    record.coaching_focus = narratives.coaching;
                    record.last_insight_generated_at = Some(now);
                }),
            )
            .await?;

        tracing::info!(
            source = source.as_str(),
            reason = decision.label(),
            calls = snapshot.calls,
            "City insight refreshed"
        );

        Ok(RefreshReport {
            decision,
            source,
            insight,
        })
    }

    async fn decide(
        &self,
        key: EntityKey,
        last_generated: Option<Timestamp>,
        now: Timestamp,
    ) -> CallsightResult<RefreshDecision> {
        let has_recent = self
            .store
            .has_activity_since(key, now - self.config.recent_activity_window())
            .await?;
        Ok(decide(last_generated, has_recent, now, self.config.cache_ttl()))
    }

    async fn summarize(
        &self,
        slot: PeriodSlot,
        subject: &str,
        lines: &[String],
    ) -> CallsightResult<String> {
        self.engine
            .summarize_period(slot, subject, lines)
            .await
            .ok_or_else(|| {
                LlmError::GenerationFailed {
                    slot: slot.label().to_string(),
                }
                .into()
            })
    }
}

impl std::fmt::Debug for InsightPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightPipeline")
            .field("engine", &self.engine)
            .field("locks", &self.locks.len())
            .field("config", &self.config)
            .finish()
    }
}

struct CityNarratives {
    source: RefreshSource,
    daily: String,
    monthly: String,
    overall: Option<String>,
    change_summary: String,
    coaching: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsight_core::Escalation;
    use callsight_llm::{NarrativeConfig, MERGE_FAILED_SUMMARY};
    use callsight_storage::InMemoryStore;
    use callsight_test_utils::{assertions, fixtures, ScriptedTextGenerator};
    use chrono::Duration;

    fn pipeline(
        store: &InMemoryStore,
        generator: Arc<ScriptedTextGenerator>,
    ) -> InsightPipeline {
        let engine = NarrativeEngine::new(generator, NarrativeConfig::default());
        InsightPipeline::new(
            Arc::new(store.clone()),
            Arc::new(engine),
            InsightConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_unknown_agent_is_not_found() {
        let store = InMemoryStore::new();
        let generator = Arc::new(ScriptedTextGenerator::always("x"));
        let result = pipeline(&store, generator.clone())
            .refresh_agent(uuid::Uuid::now_v7())
            .await;
        assertions::assert_not_found(&result, EntityType::Agent);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_agent_first_refresh_generates_and_merges() {
        let store = InMemoryStore::new();
        let agent = fixtures::seed_agent(&store, "Asha").await.unwrap();
        fixtures::seed_call(
            &store,
            Some(agent.agent_id),
            None,
            fixtures::days_ago(3),
            "Medical Emergency",
            0.8,
            Escalation::Clear,
        )
        .await
        .unwrap();

        let generator = Arc::new(
            ScriptedTextGenerator::new()
                .then_ok("Strong month.")
                .then_merge("Consistently strong.", "First profile."),
        );
        let report = pipeline(&store, generator.clone())
            .refresh_agent(agent.agent_id)
            .await
            .unwrap();

        assert_eq!(report.source, RefreshSource::Generated);
        assert_eq!(generator.slots(), vec!["agent_monthly", "agent_merge"]);
        let insight = report.insight;
        assert_eq!(insight.latest_period_insight.as_deref(), Some("Strong month."));
        assert_eq!(insight.overall_insight.as_deref(), Some("Consistently strong."));
        assert_eq!(insight.latest_change_summary.as_deref(), Some("First profile."));
        assert_eq!(insight.insight_history.len(), 1);
        assert_eq!(insight.current.calls, 1);
        assert!(insight.last_insight_generated_at.is_some());
    }

    #[tokio::test]
    async fn test_summary_failure_writes_nothing() {
        let store = InMemoryStore::new();
        let agent = fixtures::seed_agent(&store, "Ravi").await.unwrap();
        fixtures::seed_call(
            &store,
            Some(agent.agent_id),
            None,
            fixtures::days_ago(1),
            "Fire",
            0.5,
            Escalation::Clear,
        )
        .await
        .unwrap();

        let generator = Arc::new(ScriptedTextGenerator::failing());
        let result = pipeline(&store, generator)
            .refresh_agent(agent.agent_id)
            .await;
        assertions::assert_upstream_error(&result);
        assert!(store.agent_insight_get(agent.agent_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_failure_keeps_period_and_previous_overall() {
        let store = InMemoryStore::new();
        let agent = fixtures::seed_agent(&store, "Meera").await.unwrap();
        store
            .agent_insight_upsert(
                agent.agent_id,
                Box::new(|r: &mut AgentInsight| {
                    r.overall_insight = Some("Long-time steady performer.".to_string());
                    r.last_insight_generated_at = Some(Utc::now() - Duration::hours(3));
                }),
            )
            .await
            .unwrap();
        fixtures::seed_call(
            &store,
            Some(agent.agent_id),
            None,
            fixtures::days_ago(2),
            "Fire",
            0.6,
            Escalation::Clear,
        )
        .await
        .unwrap();

        let generator = Arc::new(
            ScriptedTextGenerator::new()
                .then_ok("Quieter month.")
                .then_fail(),
        );
        let report = pipeline(&store, generator)
            .refresh_agent(agent.agent_id)
            .await
            .unwrap();

        let insight = report.insight;
        assert_eq!(insight.latest_period_insight.as_deref(), Some("Quieter month."));
        assert_eq!(
            insight.overall_insight.as_deref(),
            Some("Long-time steady performer.")
        );
        assert_eq!(insight.latest_change_summary.as_deref(), Some(MERGE_FAILED_SUMMARY));
    }

    #[tokio::test]
    async fn test_city_empty_window_writes_placeholders() {
        let store = InMemoryStore::new();
        let city = fixtures::seed_city(&store, "Nagpur", Some("Maharashtra"))
            .await
            .unwrap();
        let generator = Arc::new(ScriptedTextGenerator::always("unused"));

        let report = pipeline(&store, generator.clone())
            .refresh_city(city.city_id)
            .await
            .unwrap();

        assert_eq!(report.source, RefreshSource::Placeholder);
        assert_eq!(generator.call_count(), 0);
        let insight = report.insight;
        assert_eq!(insight.daily_ops_insight.as_deref(), Some(CITY_NO_CALLS_TODAY));
        assert_eq!(insight.latest_month_insight.as_deref(), Some(CITY_NO_CALLS_MONTH));
        assert_eq!(insight.overall_city_insight.as_deref(), Some(CITY_NO_HISTORY));
        assert_eq!(insight.coaching_focus.as_deref(), Some(CITY_NO_COACHING_DATA));
        assert!(insight.last_insight_generated_at.is_some());
    }
}
