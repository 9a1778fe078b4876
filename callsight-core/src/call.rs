//! Call records and their analysis outcomes

use crate::error::IntegrityError;
use crate::score::{clamp_unit, ScoreDomain};
use crate::{AgentId, CallContext, CallId, CityId, ProcessingStatus, Timestamp};
use serde::{Deserialize, Serialize};

/// An ingested call recording.
///
/// Immutable after creation except for `processing_status`. `agent_id` and
/// `city_id` are weak references and become `None` when the owner is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: CallId,
    pub agent_id: Option<AgentId>,
    pub city_id: Option<CityId>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_preferred_language: Option<String>,
    pub audio_url: String,
    pub duration_seconds: i32,
    pub call_timestamp: Timestamp,
    pub call_context: CallContext,
    pub primary_issue_category: Option<String>,
    pub agent_manual_note: Option<String>,
    pub processing_status: ProcessingStatus,
}

impl CallRecord {
    /// Whether the issue category marks this call as an emergency.
    pub fn is_emergency(&self) -> bool {
        self.primary_issue_category
            .as_deref()
            .map(|c| c.to_lowercase().contains("emergency"))
            .unwrap_or(false)
    }
}

// ============================================================================
// ESCALATION
// ============================================================================

/// Escalation signal. A flagged call always carries a non-empty reason; a
/// clear call never carries one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EscalationRepr", into = "EscalationRepr")]
pub enum Escalation {
    Clear,
    Flagged { reason: String },
}

impl Escalation {
    /// Build from the wire pair `(escalation_risk, why_flagged)`.
    ///
    /// A reason supplied alongside `false` is dropped.
    pub fn from_signal(risk: bool, why_flagged: Option<String>) -> Result<Self, IntegrityError> {
        if !risk {
            return Ok(Escalation::Clear);
        }
        match why_flagged.map(|r| r.trim().to_string()) {
            Some(reason) if !reason.is_empty() => Ok(Escalation::Flagged { reason }),
            _ => Err(IntegrityError::EscalationWithoutReason),
        }
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self, Escalation::Flagged { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Escalation::Clear => None,
            Escalation::Flagged { reason } => Some(reason),
        }
    }
}

/// Column-shaped form of [`Escalation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRepr {
    pub escalation_risk: bool,
    #[serde(default)]
    pub why_flagged: Option<String>,
}

impl TryFrom<EscalationRepr> for Escalation {
    type Error = IntegrityError;

    fn try_from(repr: EscalationRepr) -> Result<Self, Self::Error> {
        Escalation::from_signal(repr.escalation_risk, repr.why_flagged)
    }
}

impl From<Escalation> for EscalationRepr {
    fn from(escalation: Escalation) -> Self {
        match escalation {
            Escalation::Clear => EscalationRepr {
                escalation_risk: false,
                why_flagged: None,
            },
            Escalation::Flagged { reason } => EscalationRepr {
                escalation_risk: true,
                why_flagged: Some(reason),
            },
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Scores attached to an analyzed call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct OutcomeScores {
    pub sop_compliance: f64,
    pub conversation_control: f64,
    pub communication: f64,
    pub coaching_priority: f64,
    /// One of `{0, 0.5, 1}` once normalized.
    pub sentiment_stabilization: f64,
    /// One of `{0, 0.75, 1}` once normalized.
    pub resolution_validity: f64,
    pub overall_quality: f64,
}

impl OutcomeScores {
    fn fields(&self) -> [(&'static str, f64, ScoreDomain); 7] {
        [
            ("sop_compliance", self.sop_compliance, ScoreDomain::Unit),
            ("conversation_control", self.conversation_control, ScoreDomain::Unit),
            ("communication", self.communication, ScoreDomain::Unit),
            ("coaching_priority", self.coaching_priority, ScoreDomain::Unit),
            (
                "sentiment_stabilization",
                self.sentiment_stabilization,
                ScoreDomain::Sentiment,
            ),
            (
                "resolution_validity",
                self.resolution_validity,
                ScoreDomain::ResolutionValidity,
            ),
            ("overall_quality", self.overall_quality, ScoreDomain::Unit),
        ]
    }

    /// Clamp bounded scores and snap discrete ones onto their scales.
    pub fn normalized(self) -> Self {
        Self {
            sop_compliance: clamp_unit(self.sop_compliance),
            conversation_control: clamp_unit(self.conversation_control),
            communication: clamp_unit(self.communication),
            coaching_priority: clamp_unit(self.coaching_priority),
            sentiment_stabilization: ScoreDomain::Sentiment.normalize(self.sentiment_stabilization),
            resolution_validity: ScoreDomain::ResolutionValidity
                .normalize(self.resolution_validity),
            overall_quality: clamp_unit(self.overall_quality),
        }
    }

    /// Reject any score outside its domain.
    pub fn check_domains(&self) -> Result<(), IntegrityError> {
        for (field, value, domain) in self.fields() {
            if !domain.contains(value) {
                return Err(IntegrityError::ScoreOutOfDomain {
                    field: field.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Analysis result for one call. Owned by its [`CallRecord`] and deleted
/// with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub call_id: CallId,
    pub transcript: Option<String>,
    pub language_spoken: Option<String>,
    pub scores: OutcomeScores,
    #[serde(flatten)]
    pub escalation: Escalation,
    pub human_remarks: Option<String>,
    pub business_insight: Option<String>,
    pub coaching_insight: Option<String>,
    #[serde(default)]
    pub sop_deviations: serde_json::Value,
    #[serde(default)]
    pub sentiment_trajectory: serde_json::Value,
    #[serde(default)]
    pub issue_analysis: serde_json::Value,
    #[serde(default)]
    pub resolution_analysis: serde_json::Value,
    pub created_at: Timestamp,
}

impl CallOutcome {
    /// Create an outcome with normalized scores and empty narrative fields.
    pub fn new(call_id: CallId, scores: OutcomeScores, escalation: Escalation) -> Self {
        Self {
            call_id,
            transcript: None,
            language_spoken: None,
            scores: scores.normalized(),
            escalation,
            human_remarks: None,
            business_insight: None,
            coaching_insight: None,
            sop_deviations: serde_json::Value::Null,
            sentiment_trajectory: serde_json::Value::Null,
            issue_analysis: serde_json::Value::Null,
            resolution_analysis: serde_json::Value::Null,
            created_at: chrono::Utc::now(),
        }
    }
}

/// A call joined with its outcome, if analysis has completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedCall {
    pub call: CallRecord,
    pub outcome: Option<CallOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_flagged_requires_reason() {
        assert_eq!(
            Escalation::from_signal(true, None),
            Err(IntegrityError::EscalationWithoutReason)
        );
        assert_eq!(
            Escalation::from_signal(true, Some("   ".to_string())),
            Err(IntegrityError::EscalationWithoutReason)
        );
        assert_eq!(
            Escalation::from_signal(true, Some("abusive caller".to_string())),
            Ok(Escalation::Flagged {
                reason: "abusive caller".to_string()
            })
        );
    }

    #[test]
    fn test_clear_drops_reason() {
        let esc = Escalation::from_signal(false, Some("stray".to_string()));
        assert_eq!(esc, Ok(Escalation::Clear));
    }

    #[test]
    fn test_outcome_serializes_flat_escalation() -> Result<(), serde_json::Error> {
        let outcome = CallOutcome::new(
            Uuid::nil(),
            OutcomeScores::default(),
            Escalation::Flagged {
                reason: "threat".to_string(),
            },
        );
        let value = serde_json::to_value(&outcome)?;
        assert_eq!(value["escalation_risk"], true);
        assert_eq!(value["why_flagged"], "threat");
        Ok(())
    }

    #[test]
    fn test_outcome_deserialize_rejects_unreasoned_flag() {
        let outcome = CallOutcome::new(Uuid::nil(), OutcomeScores::default(), Escalation::Clear);
        let mut value = match serde_json::to_value(&outcome) {
            Ok(v) => v,
            Err(e) => panic!("serialize failed: {e}"),
        };
        value["escalation_risk"] = serde_json::Value::Bool(true);
        let parsed: Result<CallOutcome, _> = serde_json::from_value(value);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_scores_normalized_on_construction() {
        let raw = OutcomeScores {
            sop_compliance: 1.4,
            conversation_control: 0.5,
            communication: -0.1,
            coaching_priority: 0.3,
            sentiment_stabilization: 0.62,
            resolution_validity: 0.9,
            overall_quality: 0.81,
        };
        let outcome = CallOutcome::new(Uuid::nil(), raw, Escalation::Clear);
        assert_eq!(outcome.scores.sop_compliance, 1.0);
        assert_eq!(outcome.scores.communication, 0.0);
        assert_eq!(outcome.scores.sentiment_stabilization, 0.5);
        assert_eq!(outcome.scores.resolution_validity, 1.0);
        assert!(outcome.scores.check_domains().is_ok());
        assert!(raw.check_domains().is_err());
    }

    #[test]
    fn test_is_emergency_case_insensitive() {
        let call = CallRecord {
            call_id: Uuid::nil(),
            agent_id: None,
            city_id: None,
            customer_name: None,
            customer_phone: None,
            customer_preferred_language: None,
            audio_url: String::new(),
            duration_seconds: 0,
            call_timestamp: chrono::Utc::now(),
            call_context: CallContext::NewIssue,
            primary_issue_category: Some("Medical EMERGENCY".to_string()),
            agent_manual_note: None,
            processing_status: ProcessingStatus::Pending,
        };
        assert!(call.is_emergency());
    }
}
