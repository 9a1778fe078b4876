//! Text-generation provider implementations
//!
//! Concrete [`TextGenerator`](crate::TextGenerator) backends plus the error
//! constructors they share.

pub mod openrouter;

pub use openrouter::{OpenRouterClient, OpenRouterGenerator};

use callsight_core::{CallsightError, LlmError};

pub(crate) fn request_failed(
    provider: &str,
    status: i32,
    message: impl Into<String>,
) -> CallsightError {
    CallsightError::Llm(LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> CallsightError {
    CallsightError::Llm(LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    })
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> CallsightError {
    CallsightError::Llm(LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}
