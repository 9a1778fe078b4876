//! End-to-end refresh behaviour against the in-memory store.

use callsight_core::{AgentInsight, CityInsight, Escalation, InsightConfig, Timestamp};
use callsight_insights::pipeline::CITY_NO_CALLS_TODAY;
use callsight_insights::{InsightPipeline, RefreshDecision, RefreshReason, RefreshSource};
use callsight_llm::{NarrativeConfig, NarrativeEngine, MERGE_UNPARSED_SUMMARY};
use callsight_storage::{InMemoryStore, InsightStore};
use callsight_test_utils::{fixtures, ScriptedTextGenerator};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

fn pipeline(store: &InMemoryStore, generator: Arc<ScriptedTextGenerator>) -> InsightPipeline {
    let engine = NarrativeEngine::new(generator, NarrativeConfig::default());
    InsightPipeline::new(
        Arc::new(store.clone()),
        Arc::new(engine),
        InsightConfig::default(),
    )
}

async fn stamp_agent(store: &InMemoryStore, agent: &callsight_core::Agent, minutes_ago: i64) {
    store
        .agent_insight_upsert(
            agent.agent_id,
            Box::new(move |r: &mut AgentInsight| {
                r.latest_period_insight = Some("Stored period.".to_string());
                r.overall_insight = Some("Stored overall.".to_string());
                r.latest_change_summary = Some("Stored change.".to_string());
                r.last_insight_generated_at = Some(Utc::now() - Duration::minutes(minutes_ago));
            }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fresh_quiet_agent_is_served_cached_without_calls() {
    let store = InMemoryStore::new();
    let agent = fixtures::seed_agent(&store, "Asha").await.unwrap();
    fixtures::seed_call(
        &store,
        Some(agent.agent_id),
        None,
        fixtures::minutes_ago(45),
        "Fire",
        0.7,
        Escalation::Clear,
    )
    .await
    .unwrap();
    stamp_agent(&store, &agent, 30).await;
    let before = store.agent_insight_get(agent.agent_id).await.unwrap();

    let generator = Arc::new(ScriptedTextGenerator::always("unused"));
    let report = pipeline(&store, generator.clone())
        .refresh_agent(agent.agent_id)
        .await
        .unwrap();

    assert_eq!(report.decision, RefreshDecision::ServeCached);
    assert_eq!(report.source, RefreshSource::Cached);
    assert_eq!(generator.call_count(), 0);
    assert_eq!(Some(report.insight.clone()), before);
    assert_eq!(
        store.agent_insight_get(agent.agent_id).await.unwrap(),
        before
    );
}

#[tokio::test]
async fn test_recent_call_forces_refresh() {
    let store = InMemoryStore::new();
    let agent = fixtures::seed_agent(&store, "Ravi").await.unwrap();
    stamp_agent(&store, &agent, 30).await;
    fixtures::seed_call(
        &store,
        Some(agent.agent_id),
        None,
        fixtures::minutes_ago(2),
        "Medical Emergency",
        0.9,
        Escalation::Clear,
    )
    .await
    .unwrap();

    let generator = Arc::new(
        ScriptedTextGenerator::new()
            .then_ok("Busy but calm.")
            .then_merge("Reliable under pressure.", "Handled a surge."),
    );
    let report = pipeline(&store, generator.clone())
        .refresh_agent(agent.agent_id)
        .await
        .unwrap();

    assert_eq!(
        report.decision,
        RefreshDecision::Refresh(RefreshReason::RecentActivity)
    );
    assert!(generator.call_count() >= 1);
    assert_eq!(
        report.insight.overall_insight.as_deref(),
        Some("Reliable under pressure.")
    );
    assert!(generator.requests()[1].prompt.contains("Stored overall."));
    assert_eq!(report.insight.volume.emergencies_total, 1);
}

#[tokio::test]
async fn test_agent_without_calls_keeps_overall() {
    let store = InMemoryStore::new();
    let agent = fixtures::seed_agent(&store, "Meera").await.unwrap();
    stamp_agent(&store, &agent, 120).await;

    let generator = Arc::new(ScriptedTextGenerator::always("unused"));
    let report = pipeline(&store, generator.clone())
        .refresh_agent(agent.agent_id)
        .await
        .unwrap();

    assert_eq!(report.source, RefreshSource::Placeholder);
    assert_eq!(generator.call_count(), 0);
    let insight = report.insight;
    assert_eq!(
        insight.latest_period_insight.as_deref(),
        Some("No calls recorded for this month.")
    );
    assert_eq!(
        insight.latest_change_summary.as_deref(),
        Some("No activity to analyze.")
    );
    assert_eq!(insight.overall_insight.as_deref(), Some("Stored overall."));
}

#[tokio::test]
async fn test_unparsed_merge_keeps_raw_text() {
    let store = InMemoryStore::new();
    let agent = fixtures::seed_agent(&store, "Kiran").await.unwrap();
    fixtures::seed_call(
        &store,
        Some(agent.agent_id),
        None,
        fixtures::days_ago(4),
        "Fire",
        0.4,
        Escalation::Clear,
    )
    .await
    .unwrap();

    let raw = "Kiran improved on empathy but still rushes closings.";
    let generator = Arc::new(
        ScriptedTextGenerator::new()
            .then_ok("Mixed month.")
            .then_ok(raw),
    );
    let report = pipeline(&store, generator)
        .refresh_agent(agent.agent_id)
        .await
        .unwrap();

    assert_eq!(report.insight.overall_insight.as_deref(), Some(raw));
    assert_eq!(
        report.insight.latest_change_summary.as_deref(),
        Some(MERGE_UNPARSED_SUMMARY)
    );
}

#[tokio::test]
async fn test_concurrent_refreshes_generate_once() {
    let store = InMemoryStore::new();
    let agent = fixtures::seed_agent(&store, "Dev").await.unwrap();
    fixtures::seed_call(
        &store,
        Some(agent.agent_id),
        None,
        fixtures::days_ago(1),
        "Fire",
        0.6,
        Escalation::Clear,
    )
    .await
    .unwrap();

    let generator = Arc::new(
        ScriptedTextGenerator::new()
            .then_ok("Period one.")
            .then_merge("Overall one.", "Change one.")
            .with_delay(std::time::Duration::from_millis(20)),
    );
    let pipeline = pipeline(&store, generator.clone());

    let (a, b) = tokio::join!(
        pipeline.refresh_agent(agent.agent_id),
        pipeline.refresh_agent(agent.agent_id)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(generator.call_count(), 2);
    let sources = [a.source, b.source];
    assert!(sources.contains(&RefreshSource::Generated));
    assert!(sources.contains(&RefreshSource::Cached));
    assert_eq!(a.insight.overall_insight, b.insight.overall_insight);
}

fn june_10(hour: u32, minute: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2025, 6, 10, hour, minute, 0).unwrap()
}

#[tokio::test]
async fn test_city_refresh_generates_all_slots() {
    let store = InMemoryStore::new();
    let city = fixtures::seed_city(&store, "Pune", Some("Maharashtra"))
        .await
        .unwrap();
    let now = june_10(12, 0);
    fixtures::seed_call(
        &store,
        None,
        Some(city.city_id),
        now - Duration::minutes(30),
        "Road Accident",
        0.5,
        fixtures::flagged("Caller injured"),
    )
    .await
    .unwrap();
    fixtures::seed_call(
        &store,
        None,
        Some(city.city_id),
        now - Duration::days(5),
        "Power Outage",
        0.8,
        Escalation::Clear,
    )
    .await
    .unwrap();

    let generator = Arc::new(
        ScriptedTextGenerator::new()
            .then_ok("Accidents spiking today.")
            .then_ok("Outages and accidents dominate.")
            .then_merge("City struggles with road safety.", "Accidents up.")
            .then_ok("Train agents on triage."),
    );
    let report = pipeline(&store, generator.clone())
        .refresh_city_at(city.city_id, now)
        .await
        .unwrap();

    assert_eq!(
        generator.slots(),
        vec!["city_daily_ops", "city_monthly", "city_merge", "city_coaching"]
    );
    let insight = report.insight;
    assert_eq!(
        insight.daily_ops_insight.as_deref(),
        Some("Accidents spiking today.")
    );
    assert_eq!(
        insight.overall_city_insight.as_deref(),
        Some("City struggles with road safety.")
    );
    assert_eq!(
        insight.coaching_focus.as_deref(),
        Some("Train agents on triage.")
    );
    assert_eq!(insight.operational_risks, vec!["Road Accident"]);
    assert_eq!(insight.current.calls, 2);
    assert_eq!(insight.volume.calls_today, 1);
}

#[tokio::test]
async fn test_city_coaching_carried_forward_within_month() {
    let store = InMemoryStore::new();
    let city = fixtures::seed_city(&store, "Indore", Some("Madhya Pradesh"))
        .await
        .unwrap();
    let stamped = june_10(6, 0);
    store
        .city_insight_upsert(
            city.city_id,
            Box::new(move |r: &mut CityInsight| {
                r.daily_ops_insight = Some("Old daily.".to_string());
                r.coaching_focus = Some("Focus on call closure.".to_string());
                r.last_insight_generated_at = Some(stamped);
            }),
        )
        .await
        .unwrap();
    fixtures::seed_call(
        &store,
        None,
        Some(city.city_id),
        june_10(6, 0) - Duration::days(3),
        "Fire",
        0.6,
        Escalation::Clear,
    )
    .await
    .unwrap();

    let generator = Arc::new(
        ScriptedTextGenerator::new()
            .then_ok("Monthly view.")
            .then_merge("Overall view.", "Change."),
    );
    let report = pipeline(&store, generator.clone())
        .refresh_city_at(city.city_id, june_10(12, 0))
        .await
        .unwrap();

    assert_eq!(
        report.insight.coaching_focus.as_deref(),
        Some("Focus on call closure.")
    );
    assert_eq!(generator.slots(), vec!["city_monthly", "city_merge"]);
    assert_eq!(
        report.insight.daily_ops_insight.as_deref(),
        Some(CITY_NO_CALLS_TODAY)
    );
    assert_eq!(
        report.insight.latest_month_insight.as_deref(),
        Some("Monthly view.")
    );
}

#[tokio::test]
async fn test_city_upstream_failure_leaves_cache_authoritative() {
    let store = InMemoryStore::new();
    let city = fixtures::seed_city(&store, "Surat", Some("Gujarat"))
        .await
        .unwrap();
    store
        .city_insight_upsert(
            city.city_id,
            Box::new(|r: &mut CityInsight| {
                r.latest_month_insight = Some("Old month.".to_string());
                r.last_insight_generated_at = Some(Utc::now() - Duration::hours(5));
            }),
        )
        .await
        .unwrap();
    fixtures::seed_call(
        &store,
        None,
        Some(city.city_id),
        fixtures::days_ago(2),
        "Fire",
        0.6,
        Escalation::Clear,
    )
    .await
    .unwrap();
    let before = store.city_insight_get(city.city_id).await.unwrap();

    let generator = Arc::new(ScriptedTextGenerator::failing());
    let result = pipeline(&store, generator)
        .refresh_city(city.city_id)
        .await;

    assert!(result.is_err());
    assert_eq!(store.city_insight_get(city.city_id).await.unwrap(), before);
}
