//! Callsight Core - Domain Types
//!
//! Call records and their analysis outcomes, agents, cities and the insight
//! records aggregated over them. Also hosts the score normalizer, the
//! processing-status state machine and the error taxonomy shared by every
//! other crate. Nothing in here performs I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod config;
pub mod error;
pub mod score;

mod agent;
mod call;
mod city;
mod enums;
mod insight;

pub use agent::{Agent, Languages};
pub use call::{AnalyzedCall, CallOutcome, CallRecord, Escalation, EscalationRepr, OutcomeScores};
pub use city::{City, NewCity};
pub use config::InsightConfig;
pub use enums::{CallContext, EnumParseError, ProcessingStatus, QualityTrend, Trend};
pub use error::{
    AnalysisError, CallsightError, CallsightResult, ConfigError, IntegrityError, LlmError,
    StorageError, ValidationError,
};
pub use insight::{
    push_bounded, AgentInsight, CityInsight, InsightHistoryEntry, MetricSnapshot, VolumeCounters,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Agent identifier.
pub type AgentId = Uuid;

/// Call identifier. UUIDv7 so ids sort by creation time.
pub type CallId = Uuid;

/// City identifier. Cities are a small, curated table keyed by integer.
pub type CityId = i32;

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a new UUIDv7 identifier.
pub fn new_entity_id() -> Uuid {
    Uuid::now_v7()
}

/// Entity type discriminator used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntityType {
    Agent,
    City,
    Call,
    CallOutcome,
    AgentInsight,
    CityInsight,
}

/// An entity that owns a refreshable insight record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKey {
    Agent(AgentId),
    City(CityId),
}

impl EntityKey {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityKey::Agent(_) => EntityType::Agent,
            EntityKey::City(_) => EntityType::City,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Agent(id) => write!(f, "agent:{}", id),
            EntityKey::City(id) => write!(f, "city:{}", id),
        }
    }
}
