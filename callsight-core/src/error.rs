//! Error types for Callsight operations

use crate::{EntityType, ProcessingStatus};
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: String },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Update failed for {entity_type:?} with id {id}: {reason}")]
    UpdateFailed {
        entity_type: EntityType,
        id: String,
        reason: String,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    pub fn not_found(entity_type: EntityType, id: impl ToString) -> Self {
        StorageError::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }
}

/// Text-generation provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No LLM provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Generation timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Narrative generation failed for {slot}")]
    GenerationFailed { slot: String },
}

/// External analysis service errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Analysis service rejected call {call_id} with status {status}: {message}")]
    Rejected {
        call_id: Uuid,
        status: u16,
        message: String,
    },

    #[error("Analysis service unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("Analysis payload for call {call_id} is invalid: {reason}")]
    InvalidPayload { call_id: Uuid, reason: String },
}

/// Validation errors for caller input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Could not resolve {entity_type:?} from identifier '{identifier}'")]
    UnresolvedIdentifier {
        entity_type: EntityType,
        identifier: String,
    },

    #[error("Illegal processing status transition: {from} -> {to}")]
    InvalidTransition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },
}

/// Data-integrity violations, raised by constructors that refuse to build
/// values the data model forbids.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IntegrityError {
    #[error("Escalation flagged without a reason")]
    EscalationWithoutReason,

    #[error("Score {field} = {value} lies outside its allowed domain")]
    ScoreOutOfDomain { field: String, value: f64 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Callsight errors.
#[derive(Debug, Clone, Error)]
pub enum CallsightError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CallsightError {
    /// True when the error reports a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CallsightError::Storage(StorageError::NotFound { .. }))
    }

    /// True when the error originates in an external collaborator.
    pub fn is_upstream(&self) -> bool {
        matches!(self, CallsightError::Llm(_) | CallsightError::Analysis(_))
    }
}

/// Result type alias for Callsight operations.
pub type CallsightResult<T> = Result<T, CallsightError>;

// =============================================================================
// TESTS
// =============================================================================
