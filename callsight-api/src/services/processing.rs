//! Call processing: hand a stored call to the external analysis service and
//! attach the scored outcome.
//!
//! Status moves `pending → transcribed → analyzed`. Any failure on the way,
//! including an analysis payload that breaks the escalation invariant,
//! lands the call in `failed` instead of surfacing to the caller.

use async_trait::async_trait;
use callsight_core::{
    AgentId, AnalysisError, CallContext, CallId, CallOutcome, CallRecord, CallsightError,
    CallsightResult, CityId, EntityType, Escalation, IntegrityError, OutcomeScores,
    ProcessingStatus, StorageError, Timestamp,
};
use callsight_storage::InsightStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::telemetry::metrics::METRICS;

// ============================================================================
// WIRE TYPES
// ============================================================================

/// Metadata sent to the analysis service. Customer name and phone are
/// deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    pub call_id: CallId,
    pub agent_id: Option<AgentId>,
    pub primary_issue_category: Option<String>,
    pub agent_languages: Vec<String>,
    pub call_timestamp: Timestamp,
    pub call_context: CallContext,
    pub agent_manual_note: Option<String>,
    pub customer_preferred_language: Option<String>,
    pub audio_url: String,
    pub city_id: Option<CityId>,
}

impl AnalysisRequest {
    pub fn for_call(call: &CallRecord, agent_languages: Vec<String>) -> Self {
        Self {
            call_id: call.call_id,
            agent_id: call.agent_id,
            primary_issue_category: call.primary_issue_category.clone(),
            agent_languages,
            call_timestamp: call.call_timestamp,
            call_context: call.call_context,
            agent_manual_note: call.agent_manual_note.clone(),
            customer_preferred_language: call.customer_preferred_language.clone(),
            audio_url: call.audio_url.clone(),
            city_id: call.city_id,
        }
    }
}

/// Transcript and scored analysis returned by the analysis service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub language_spoken: Option<String>,

    #[serde(alias = "sop_state_compliance_score")]
    pub sop_compliance: f64,
    #[serde(alias = "conversation_control_score")]
    pub conversation_control: f64,
    #[serde(alias = "communication_score")]
    pub communication: f64,
    #[serde(alias = "coaching_priority_score")]
    pub coaching_priority: f64,
    #[serde(alias = "sentiment_stabilization_score")]
    pub sentiment_stabilization: f64,
    #[serde(alias = "resolution_path_validity_score")]
    pub resolution_validity: f64,
    #[serde(alias = "overall_call_quality_score")]
    pub overall_quality: f64,

    #[serde(default)]
    pub escalation_risk: bool,
    #[serde(default)]
    pub why_flagged: Option<String>,

    #[serde(default)]
    pub human_remarks: Option<String>,
    #[serde(default)]
    pub business_insight: Option<String>,
    #[serde(default)]
    pub coaching_insight: Option<String>,

    #[serde(default)]
    pub sop_deviations: serde_json::Value,
    #[serde(default)]
    pub sentiment_trajectory: serde_json::Value,
    #[serde(default)]
    pub issue_analysis: serde_json::Value,
    #[serde(default)]
    pub resolution_analysis: serde_json::Value,
}

impl AnalysisReport {
    /// Build the outcome for `call_id`. Scores are normalized; a flagged
    /// escalation without a reason is refused.
    pub fn into_outcome(self, call_id: CallId) -> Result<CallOutcome, IntegrityError> {
        let escalation = Escalation::from_signal(self.escalation_risk, self.why_flagged)?;
        let scores = OutcomeScores {
            sop_compliance: self.sop_compliance,
            conversation_control: self.conversation_control,
            communication: self.communication,
            coaching_priority: self.coaching_priority,
            sentiment_stabilization: self.sentiment_stabilization,
            resolution_validity: self.resolution_validity,
            overall_quality: self.overall_quality,
        };

        let mut outcome = CallOutcome::new(call_id, scores, escalation);
        outcome.transcript = self.transcript;
        outcome.language_spoken = self.language_spoken;
        outcome.human_remarks = self.human_remarks;
        outcome.business_insight = self.business_insight;
        outcome.coaching_insight = self.coaching_insight;
        outcome.sop_deviations = self.sop_deviations;
        outcome.sentiment_trajectory = self.sentiment_trajectory;
        outcome.issue_analysis = self.issue_analysis;
        outcome.resolution_analysis = self.resolution_analysis;
        Ok(outcome)
    }
}

// ============================================================================
// ANALYSIS CLIENT
// ============================================================================

/// External transcription and scoring service.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> CallsightResult<AnalysisReport>;
}

/// Analysis client posting JSON metadata over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    url: String,
}

impl HttpAnalysisClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> CallsightResult<AnalysisReport> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| AnalysisError::Unreachable {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AnalysisError::Rejected {
                call_id: request.call_id,
                status: status.as_u16(),
                message,
            }
            .into());
        }

        response.json::<AnalysisReport>().await.map_err(|e| {
            AnalysisError::InvalidPayload {
                call_id: request.call_id,
                reason: e.to_string(),
            }
            .into()
        })
    }
}

// ============================================================================
// PROCESSOR
// ============================================================================

/// Drives one call through analysis.
pub struct CallProcessor {
    store: Arc<dyn InsightStore>,
    analysis: Arc<dyn AnalysisClient>,
}

impl CallProcessor {
    pub fn new(store: Arc<dyn InsightStore>, analysis: Arc<dyn AnalysisClient>) -> Self {
        Self { store, analysis }
    }

    /// Run analysis for `call_id` and return the status it ends in.
    ///
    /// Only a missing call or a store failure while recording the final
    /// status is returned as an error.
    pub async fn process(&self, call_id: CallId) -> CallsightResult<ProcessingStatus> {
        let call = self
            .store
            .call_get(call_id)
            .await?
            .ok_or_else(|| StorageError::not_found(EntityType::Call, call_id))?;

        match self.analyze_and_attach(&call).await {
            Ok(()) => {
                let status = self
                    .store
                    .call_set_status(call_id, ProcessingStatus::Analyzed)
                    .await?;
                tracing::info!(call_id = %call_id, "Call analyzed");
                record_outcome("analyzed");
                Ok(status)
            }
            Err(err) => {
                tracing::warn!(call_id = %call_id, error = %err, "Call processing failed");
                let status = self
                    .store
                    .call_set_status(call_id, ProcessingStatus::Failed)
                    .await?;
                record_outcome(failure_label(&err));
                Ok(status)
            }
        }
    }

    async fn analyze_and_attach(&self, call: &CallRecord) -> CallsightResult<()> {
        let languages = match call.agent_id {
            Some(agent_id) => self
                .store
                .agent_get(agent_id)
                .await?
                .map(|agent| agent.languages.into_vec())
                .unwrap_or_default(),
            None => Vec::new(),
        };

        let request = AnalysisRequest::for_call(call, languages);
        tracing::debug!(
            call_id = %call.call_id,
            audio_url = %request.audio_url,
            languages = ?request.agent_languages,
            "Sending call to analysis service"
        );
        let report = self.analysis.analyze(&request).await?;

        self.store
            .call_set_status(call.call_id, ProcessingStatus::Transcribed)
            .await?;

        let outcome = report.into_outcome(call.call_id)?;
        self.store.outcome_attach(&outcome).await
    }
}

impl std::fmt::Debug for CallProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallProcessor").finish_non_exhaustive()
    }
}

fn failure_label(err: &CallsightError) -> &'static str {
    match err {
        CallsightError::Analysis(_) => "rejected",
        CallsightError::Integrity(_) => "integrity_violation",
        _ => "failed",
    }
}

fn record_outcome(outcome: &str) {
    if let Ok(m) = METRICS.as_ref() {
        m.record_analysis(outcome);
    }
}
