//! End-to-end flows through the router over the in-memory store.

use callsight_core::{Escalation, ProcessingStatus};
use callsight_storage::InsightStore;
use callsight_test_utils::fixtures::{
    call_at, days_ago, flagged, minutes_ago, seed_agent, seed_call, seed_city,
};
use callsight_test_utils::ScriptedTextGenerator;

#[path = "support/app.rs"]
mod test_app_support;
use test_app_support::{report, CannedAnalysis, TestAppBuilder};

// ============================================================================
// ENVELOPE AND ERRORS
// ============================================================================

#[tokio::test]
async fn test_health_and_openapi_are_public() {
    let app = TestAppBuilder::new().build();

    let (status, _) = app.get("/health/ping").await;
    assert_eq!(status, 200);

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/openapi.json").await;
    assert_eq!(status, 200);
    assert_eq!(body["info"]["title"], "Callsight API");
}

#[tokio::test]
async fn test_unknown_agent_is_404_envelope() {
    let app = TestAppBuilder::new().build();
    let id = uuid::Uuid::now_v7();

    let (status, body) = app.get(&format!("/api/agents/{}/stats", id)).await;
    assert_eq!(status, 404);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], "AGENT_NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_ids_are_400() {
    let app = TestAppBuilder::new().build();

    let (status, body) = app.get("/api/agents/not-a-uuid/stats").await;
    assert_eq!(status, 400);
    assert_eq!(body["status"], "error");

    let (status, _) = app.get("/api/cities/delhi").await;
    assert_eq!(status, 400);
}

// ============================================================================
// DASHBOARD READS
// ============================================================================

#[tokio::test]
async fn test_leaderboard_and_search() {
    let app = TestAppBuilder::new()
        .generator(ScriptedTextGenerator::always("Steady handling."))
        .build();
    let store = app.store.as_ref();
    let city = seed_city(store, "Pune", Some("Maharashtra")).await.unwrap();
    let asha = seed_agent(store, "Asha Verma").await.unwrap();
    let ravi = seed_agent(store, "Ravi Kumar").await.unwrap();
    seed_call(
        store,
        Some(asha.agent_id),
        Some(city.city_id),
        days_ago(1),
        "Medical",
        0.9,
        Escalation::Clear,
    )
    .await
    .unwrap();
    seed_call(
        store,
        Some(ravi.agent_id),
        Some(city.city_id),
        days_ago(1),
        "Fire",
        0.4,
        Escalation::Clear,
    )
    .await
    .unwrap();

    // Metrics live on the insight record.
    app.state.pipeline.refresh_agent(ravi.agent_id).await.unwrap();
    app.state.pipeline.refresh_agent(asha.agent_id).await.unwrap();

    let (status, body) = app.get("/api/agents/leaderboard").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "Asha Verma");
    assert_eq!(rows[0]["rank"], 1);

    let (status, body) = app.get("/api/agents/search?query=asha").await;
    assert_eq!(status, 200);
    let hits = body["data"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["name"], "Asha Verma");

    let (status, body) = app.get("/api/agents/search").await;
    assert_eq!(status, 200);
    assert!(body["data"].is_array());
}

#[tokio::test]
async fn test_city_details_without_insight_reports_message() {
    let app = TestAppBuilder::new().build();
    let city = seed_city(app.store.as_ref(), "Nagpur", Some("Maharashtra"))
        .await
        .unwrap();

    let (status, body) = app.get(&format!("/api/cities/{}", city.city_id)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["city_info"]["name"], "Nagpur");
    assert!(body["data"]["message"].is_string());

    let (status, body) = app.get("/api/cities").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_escalation_feed_lists_recent_flags_only() {
    let app = TestAppBuilder::new().build();
    let store = app.store.as_ref();
    let city = seed_city(store, "Patna", Some("Bihar")).await.unwrap();
    let agent = seed_agent(store, "Meena Das").await.unwrap();
    let recent = seed_call(
        store,
        Some(agent.agent_id),
        Some(city.city_id),
        minutes_ago(1),
        "Police",
        0.3,
        flagged("Caller threatened self-harm"),
    )
    .await
    .unwrap();
    seed_call(
        store,
        Some(agent.agent_id),
        Some(city.city_id),
        days_ago(2),
        "Police",
        0.3,
        flagged("Old escalation"),
    )
    .await
    .unwrap();

    let (status, body) = app.get("/api/escalations/recent").await;
    assert_eq!(status, 200);
    let calls = body["data"]["flagged_calls"].as_array().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["call_id"], recent.to_string());
}

#[tokio::test]
async fn test_worst_call_for_quiet_agent_is_empty() {
    let app = TestAppBuilder::new().build();
    let agent = seed_agent(app.store.as_ref(), "Quiet Agent").await.unwrap();

    let (status, body) = app
        .get(&format!("/api/agents/{}/worst-call", agent.agent_id))
        .await;
    assert_eq!(status, 200);
    assert!(body["data"]["worst_call"].is_null());
    assert!(body["message"].is_string());
}

// ============================================================================
// INSIGHT REFRESH
// ============================================================================

#[tokio::test]
async fn test_agent_refresh_generates_then_serves_cache() {
    let app = TestAppBuilder::new()
        .generator(ScriptedTextGenerator::always("Calm under pressure."))
        .build();
    let store = app.store.as_ref();
    let agent = seed_agent(store, "Kiran Rao").await.unwrap();
    seed_call(store, Some(agent.agent_id), None, days_ago(2), "Medical", 0.7, Escalation::Clear)
        .await
        .unwrap();

    let uri = format!("/api/agents/{}/generate-insights", agent.agent_id);
    let (status, body) = app.post(&uri).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["source"], "generated");
    assert_eq!(body["data"]["reason"], "never_generated");
    let calls_after_first = app.generator.call_count();
    assert!(calls_after_first > 0);

    let (status, body) = app.post(&uri).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["source"], "cached");
    assert_eq!(app.generator.call_count(), calls_after_first);
}

#[tokio::test]
async fn test_refresh_for_missing_city_is_404() {
    let app = TestAppBuilder::new().build();
    let (status, body) = app.post("/api/cities/999/generate-insights").await;
    assert_eq!(status, 404);
    assert_eq!(body["code"], "CITY_NOT_FOUND");
}

#[tokio::test]
async fn test_refresh_generation_failure_is_500() {
    let app = TestAppBuilder::new()
        .generator(ScriptedTextGenerator::failing())
        .build();
    let store = app.store.as_ref();
    let agent = seed_agent(store, "Failing Model").await.unwrap();
    seed_call(store, Some(agent.agent_id), None, days_ago(1), "Fire", 0.5, Escalation::Clear)
        .await
        .unwrap();

    let (status, body) = app
        .post(&format!("/api/agents/{}/generate-insights", agent.agent_id))
        .await;
    assert_eq!(status, 500);
    assert_eq!(body["status"], "error");
    assert!(store.agent_insight_get(agent.agent_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_state_dashboard_after_city_refresh() {
    let app = TestAppBuilder::new()
        .generator(ScriptedTextGenerator::always("Dispatch delays at night."))
        .build();
    let store = app.store.as_ref();
    let city = seed_city(store, "Lucknow", Some("Uttar Pradesh")).await.unwrap();
    seed_call(store, None, Some(city.city_id), days_ago(1), "Medical", 0.6, Escalation::Clear)
        .await
        .unwrap();

    let (status, _) = app
        .post(&format!("/api/cities/{}/generate-insights", city.city_id))
        .await;
    assert_eq!(status, 200);

    let (status, body) = app.get("/api/dashboard/states").await;
    assert_eq!(status, 200);
    let states = body["data"].as_array().unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0]["state"], "Uttar Pradesh");
}

// ============================================================================
// PROCESSING
// ============================================================================

#[tokio::test]
async fn test_process_and_status_flow() {
    let analysis = CannedAnalysis::ok(report(0.75, false, None));
    let app = TestAppBuilder::new().analysis(analysis.clone()).build();
    let call = call_at(None, None, minutes_ago(5), "Medical");
    app.store.call_insert(&call).await.unwrap();

    let (status, body) = app.get(&format!("/api/calls/{}/status", call.call_id)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["processing_status"], "pending");

    let (status, body) = app.post(&format!("/api/calls/{}/process", call.call_id)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["processing_status"], "analyzed");
    assert_eq!(analysis.requests().len(), 1);

    let (status, body) = app.post(&format!("/api/calls/{}/process", call.call_id)).await;
    assert_eq!(status, 409);
    assert_eq!(body["code"], "STATE_CONFLICT");
}

#[tokio::test]
async fn test_flag_without_reason_fails_the_call() {
    let analysis = CannedAnalysis::ok(report(0.5, true, None));
    let app = TestAppBuilder::new().analysis(analysis).build();
    let call = call_at(None, None, minutes_ago(5), "Police");
    app.store.call_insert(&call).await.unwrap();

    let (status, body) = app.post(&format!("/api/calls/{}/process", call.call_id)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["processing_status"], "failed");

    let stored = app.store.call_get(call.call_id).await.unwrap().unwrap();
    assert_eq!(stored.processing_status, ProcessingStatus::Failed);
    assert!(app.store.outcome_get(call.call_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unreachable_analysis_fails_and_stays_failed() {
    let analysis = CannedAnalysis::down();
    let app = TestAppBuilder::new().analysis(analysis.clone()).build();
    let call = call_at(None, None, minutes_ago(5), "Fire");
    app.store.call_insert(&call).await.unwrap();

    let (status, body) = app.post(&format!("/api/calls/{}/process", call.call_id)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["processing_status"], "failed");

    analysis.set_report(report(0.9, false, None));
    let (status, body) = app.post(&format!("/api/calls/{}/process", call.call_id)).await;
    assert_eq!(status, 409);
    assert_eq!(body["code"], "STATE_CONFLICT");
    assert_eq!(analysis.requests().len(), 1);
}

#[tokio::test]
async fn test_metrics_endpoint_is_exposed() {
    let app = TestAppBuilder::new().build();
    let _ = app.get("/health/ping").await;

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        axum::http::Request::get("/metrics")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}
