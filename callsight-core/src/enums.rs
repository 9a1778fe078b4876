//! Enum types with their database string representations

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error when parsing an enum from its string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

impl From<EnumParseError> for ValidationError {
    fn from(err: EnumParseError) -> Self {
        ValidationError::InvalidValue {
            field: err.kind.to_string(),
            reason: format!("unrecognised value '{}'", err.value),
        }
    }
}

// ============================================================================
// CALL CONTEXT
// ============================================================================

/// Where a call sits in the customer's case history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallContext {
    #[default]
    NewIssue,
    FollowUp,
    OngoingCase,
    Reopened,
    InformationOnly,
    ClosedIssue,
}

impl CallContext {
    pub const ALL: [CallContext; 6] = [
        CallContext::NewIssue,
        CallContext::FollowUp,
        CallContext::OngoingCase,
        CallContext::Reopened,
        CallContext::InformationOnly,
        CallContext::ClosedIssue,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            CallContext::NewIssue => "NEW_ISSUE",
            CallContext::FollowUp => "FOLLOW_UP",
            CallContext::OngoingCase => "ONGOING_CASE",
            CallContext::Reopened => "REOPENED",
            CallContext::InformationOnly => "INFORMATION_ONLY",
            CallContext::ClosedIssue => "CLOSED_ISSUE",
        }
    }

    /// Parse from database string representation. Accepts any case and
    /// spaces or hyphens in place of underscores.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        CallContext::ALL
            .into_iter()
            .find(|ctx| ctx.as_db_str() == normalized)
            .ok_or_else(|| EnumParseError {
                kind: "call_context",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for CallContext {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// PROCESSING STATUS
// ============================================================================

/// Processing state of a call recording.
///
/// Forward-only: `pending -> transcribed -> analyzed`, and any state may
/// move to `failed`. Nothing ever moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Transcribed,
    Analyzed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Transcribed => "transcribed",
            ProcessingStatus::Analyzed => "analyzed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ProcessingStatus::Pending),
            "transcribed" => Ok(ProcessingStatus::Transcribed),
            "analyzed" => Ok(ProcessingStatus::Analyzed),
            "failed" => Ok(ProcessingStatus::Failed),
            _ => Err(EnumParseError {
                kind: "processing_status",
                value: s.to_string(),
            }),
        }
    }

    /// Whether `next` is reachable in one step. Re-applying the current
    /// status is allowed and changes nothing.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        match (*self, next) {
            (current, next) if current == next => true,
            (Pending, Transcribed) | (Transcribed, Analyzed) => true,
            (Pending | Transcribed | Analyzed, Failed) => true,
            _ => false,
        }
    }

    /// Apply a transition, rejecting anything that would move backwards.
    pub fn transition_to(self, next: ProcessingStatus) -> Result<Self, ValidationError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ValidationError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// No further work will happen for a call in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingStatus::Analyzed | ProcessingStatus::Failed)
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

// ============================================================================
// TRENDS
// ============================================================================

/// Direction of a metric compared with the previous period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn between(current: f64, previous: f64) -> Self {
        if current > previous {
            Trend::Up
        } else if current < previous {
            Trend::Down
        } else {
            Trend::Stable
        }
    }
}

/// Quality direction reported on city drill-downs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum QualityTrend {
    Improving,
    Declining,
    Stable,
}

impl QualityTrend {
    pub fn between(current: f64, previous: f64) -> Self {
        match Trend::between(current, previous) {
            Trend::Up => QualityTrend::Improving,
            Trend::Down => QualityTrend::Declining,
            Trend::Stable => QualityTrend::Stable,
        }
    }
}
