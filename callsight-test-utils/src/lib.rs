//! Callsight Test Utilities
//!
//! Centralized test infrastructure for the Callsight workspace:
//! - A scripted text generator standing in for the model provider
//! - Test fixtures for agents, cities, calls and outcomes
//! - Proptest generators for domain types
//! - Custom assertions for Callsight error variants

pub use callsight_storage::InMemoryStore;

pub use callsight_core::{
    Agent, AgentId, AnalyzedCall, CallContext, CallId, CallOutcome, CallRecord, CallsightError,
    CallsightResult, City, CityId, EntityType, Escalation, Languages, LlmError, NewCity,
    OutcomeScores, ProcessingStatus, StorageError, Timestamp,
};

use async_trait::async_trait;
use callsight_llm::{GenerationRequest, TextGenerator};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// SCRIPTED TEXT GENERATOR
// ============================================================================

/// Text generator that replays a queue of scripted answers.
///
/// Once the queue is drained every call returns the fallback answer, which
/// defaults to a failure. Every request is recorded for later inspection.
#[derive(Debug)]
pub struct ScriptedTextGenerator {
    queue: Mutex<VecDeque<CallsightResult<String>>>,
    fallback: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl Default for ScriptedTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTextGenerator {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with `text`.
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::new()
        }
    }

    /// Fail every call.
    pub fn failing() -> Self {
        Self::new()
    }

    /// Queue a successful answer.
    pub fn then_ok(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// Queue a failed answer.
    pub fn then_fail(self) -> Self {
        self.push(Err(LlmError::RequestFailed {
            provider: "scripted".to_string(),
            status: 500,
            message: "scripted failure".to_string(),
        }
        .into()));
        self
    }

    /// Queue a well-formed merge answer.
    pub fn then_merge(self, overall: &str, change: &str) -> Self {
        self.then_ok(merge_response(overall, change))
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, answer: CallsightResult<String>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(answer);
        }
    }

    /// Number of `generate` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Slot labels of the requests received, in call order.
    pub fn slots(&self) -> Vec<&'static str> {
        self.requests().into_iter().map(|r| r.slot).collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedTextGenerator {
    async fn generate(&self, request: &GenerationRequest) -> CallsightResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        match scripted {
            Some(answer) => answer,
            None => match &self.fallback {
                Some(text) => Ok(text.clone()),
                None => Err(LlmError::ProviderNotConfigured.into()),
            },
        }
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

/// Render a merge answer in the two-section marker format.
pub fn merge_response(overall: &str, change: &str) -> String {
    format!(
        "[OVERALL_START]\n{}\n[OVERALL_END]\n\n[CHANGE_START]\n{}\n[CHANGE_END]",
        overall, change
    )
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;
    use callsight_storage::InsightStore;
    use chrono::Utc;

    /// Create an agent with a unique employee code.
    pub fn agent(name: &str) -> Agent {
        let code = format!("EMP-{}", &uuid::Uuid::now_v7().simple().to_string()[24..]);
        Agent::new(name, code, Languages::parse("English, Hindi"))
    }

    /// Create a pending call at `at`.
    pub fn call_at(
        agent_id: Option<AgentId>,
        city_id: Option<CityId>,
        at: Timestamp,
        category: &str,
    ) -> CallRecord {
        CallRecord {
            call_id: callsight_core::new_entity_id(),
            agent_id,
            city_id,
            customer_name: Some("Test Caller".to_string()),
            customer_phone: Some("+919800000000".to_string()),
            customer_preferred_language: Some("Hindi".to_string()),
            audio_url: "http://localhost:8080/audio/calls/test.mp3".to_string(),
            duration_seconds: 120,
            call_timestamp: at,
            call_context: CallContext::NewIssue,
            primary_issue_category: Some(category.to_string()),
            agent_manual_note: None,
            processing_status: ProcessingStatus::Pending,
        }
    }

    /// Uniform scores with the given overall quality.
    pub fn scores(quality: f64) -> OutcomeScores {
        OutcomeScores {
            sop_compliance: quality,
            conversation_control: quality,
            communication: quality,
            coaching_priority: 1.0 - quality,
            sentiment_stabilization: quality,
            resolution_validity: quality,
            overall_quality: quality,
        }
        .normalized()
    }

    /// An outcome with narrative text filled in.
    pub fn outcome(call_id: CallId, quality: f64, escalation: Escalation) -> CallOutcome {
        let mut outcome = CallOutcome::new(call_id, scores(quality), escalation);
        outcome.transcript = Some("Caller reported an issue.".to_string());
        outcome.language_spoken = Some("Hindi".to_string());
        outcome.human_remarks = Some("Handled politely.".to_string());
        outcome.business_insight = Some("Response times are slipping.".to_string());
        outcome.coaching_insight = Some("Confirm the caller's location first.".to_string());
        outcome
    }

    /// A flagged escalation.
    pub fn flagged(reason: &str) -> Escalation {
        Escalation::Flagged {
            reason: reason.to_string(),
        }
    }

    /// Insert an analyzed call with its outcome.
    pub async fn seed_call<S: InsightStore + ?Sized>(
        store: &S,
        agent_id: Option<AgentId>,
        city_id: Option<CityId>,
        at: Timestamp,
        category: &str,
        quality: f64,
        escalation: Escalation,
    ) -> CallsightResult<CallId> {
        let mut call = call_at(agent_id, city_id, at, category);
        call.processing_status = ProcessingStatus::Analyzed;
        store.call_insert(&call).await?;
        store
            .outcome_attach(&outcome(call.call_id, quality, escalation))
            .await?;
        Ok(call.call_id)
    }

    /// Insert a fresh agent.
    pub async fn seed_agent<S: InsightStore + ?Sized>(
        store: &S,
        name: &str,
    ) -> CallsightResult<Agent> {
        let agent = agent(name);
        store.agent_insert(&agent).await?;
        Ok(agent)
    }

    /// Insert a fresh city.
    pub async fn seed_city<S: InsightStore + ?Sized>(
        store: &S,
        name: &str,
        state: Option<&str>,
    ) -> CallsightResult<City> {
        store.city_insert(&NewCity::new(name, state)).await
    }

    /// `minutes` before now.
    pub fn minutes_ago(minutes: i64) -> Timestamp {
        Utc::now() - chrono::Duration::minutes(minutes)
    }

    /// `days` before now.
    pub fn days_ago(days: i64) -> Timestamp {
        Utc::now() - chrono::Duration::days(days)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Callsight domain types.

    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    /// Raw score as an external service might send it, including values
    /// outside `[0, 1]`.
    pub fn arb_raw_score() -> impl Strategy<Value = f64> {
        prop_oneof![
            8 => 0.0f64..=1.0,
            1 => -2.0f64..0.0,
            1 => 1.0f64..3.0,
        ]
    }

    /// Un-normalized score set.
    pub fn arb_raw_scores() -> impl Strategy<Value = OutcomeScores> {
        (
            arb_raw_score(),
            arb_raw_score(),
            arb_raw_score(),
            arb_raw_score(),
            arb_raw_score(),
            arb_raw_score(),
            arb_raw_score(),
        )
            .prop_map(|(a, b, c, d, e, f, g)| OutcomeScores {
                sop_compliance: a,
                conversation_control: b,
                communication: c,
                coaching_priority: d,
                sentiment_stabilization: e,
                resolution_validity: f,
                overall_quality: g,
            })
    }

    pub fn arb_escalation() -> impl Strategy<Value = Escalation> {
        prop_oneof![
            Just(Escalation::Clear),
            "[A-Za-z][A-Za-z ]{0,40}".prop_map(|reason| Escalation::Flagged { reason }),
        ]
    }

    pub fn arb_call_context() -> impl Strategy<Value = CallContext> {
        prop::sample::select(CallContext::ALL.to_vec())
    }

    pub fn arb_processing_status() -> impl Strategy<Value = ProcessingStatus> {
        prop_oneof![
            Just(ProcessingStatus::Pending),
            Just(ProcessingStatus::Transcribed),
            Just(ProcessingStatus::Analyzed),
            Just(ProcessingStatus::Failed),
        ]
    }

    /// Timestamp within the trailing `days`.
    pub fn arb_recent_timestamp(days: i64) -> impl Strategy<Value = Timestamp> {
        (0i64..days.max(1) * 86_400).prop_map(|secs| Utc::now() - chrono::Duration::seconds(secs))
    }

    pub fn arb_issue_category() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "Medical Emergency".to_string(),
            "Fire Emergency".to_string(),
            "Road Accident".to_string(),
            "Noise Complaint".to_string(),
            "Power Outage".to_string(),
        ])
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over Callsight results.

    use super::*;

    /// Assert that a result is a NotFound storage error for `entity_type`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(
        result: &CallsightResult<T>,
        entity_type: EntityType,
    ) {
        match result {
            Err(CallsightError::Storage(StorageError::NotFound {
                entity_type: et, ..
            })) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!(
                "Expected NotFound error for {:?}, got: {:?}",
                entity_type, other
            ),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &CallsightResult<T>) {
        match result {
            Err(CallsightError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_integrity_error<T: std::fmt::Debug>(result: &CallsightResult<T>) {
        match result {
            Err(CallsightError::Integrity(_)) => {}
            other => panic!("Expected Integrity error, got: {:?}", other),
        }
    }

    /// Assert that a result is an upstream (model or analysis) failure.
    #[track_caller]
    pub fn assert_upstream_error<T: std::fmt::Debug>(result: &CallsightResult<T>) {
        match result {
            Err(e) if e.is_upstream() => {}
            other => panic!("Expected upstream error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
