//! Callsight LLM - Text Generation and Narrative Merge
//!
//! Provider-agnostic text-generation trait, the OpenRouter backend, and the
//! narrative engine that turns call corpora into period insights and folds
//! them into an entity's cumulative narrative.

pub mod narrative;
pub mod providers;

pub use narrative::{
    DelimitedSectionParser, MergeOutcome, MergeResponseParser, MergeSubject, MergedNarrative,
    NarrativeConfig, NarrativeEngine, ParsedMerge, PeriodSlot, MERGE_FAILED_SUMMARY,
    MERGE_UNPARSED_SUMMARY, NO_PREVIOUS_HISTORY,
};
pub use providers::{OpenRouterClient, OpenRouterGenerator};

use async_trait::async_trait;
use callsight_core::{CallsightResult, LlmError};
use secrecy::SecretString;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// TEXT GENERATOR TRAIT
// ============================================================================

/// A single system + user prompt sent to a text model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Metric label for the narrative slot this request fills.
    pub slot: &'static str,
    pub system: String,
    pub prompt: String,
    pub max_tokens: i32,
    pub temperature: f32,
}

/// Trait for text-generation providers.
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for the request.
    ///
    /// # Returns
    /// * `Ok(String)` - The generated text, trimmed
    /// * `Err(CallsightError::Llm)` - If the provider is missing or the call fails
    async fn generate(&self, request: &GenerationRequest) -> CallsightResult<String>;

    /// Get the model identifier for this provider.
    fn model_id(&self) -> &str;
}

/// Generator used when no API key is configured. Every call fails with
/// `ProviderNotConfigured`.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> CallsightResult<String> {
        Err(LlmError::ProviderNotConfigured.into())
    }

    fn model_id(&self) -> &str {
        "unconfigured"
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Text-generation configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenRouter API key. `None` disables generation.
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub requests_per_minute: u32,
    /// Upper bound on a single generation call.
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "x-ai/grok-4.1-fast".to_string(),
            requests_per_minute: 60,
            timeout: Duration::from_secs(30),
        }
    }
}

impl LlmConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(|k| SecretString::new(k.into()));

        let base_url = std::env::var("OPENROUTER_BASE_URL").unwrap_or(defaults.base_url);
        let model = std::env::var("CALLSIGHT_LLM_MODEL").unwrap_or(defaults.model);

        let requests_per_minute = std::env::var("CALLSIGHT_LLM_RPM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.requests_per_minute);

        let timeout = std::env::var("CALLSIGHT_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            api_key,
            base_url,
            model,
            requests_per_minute,
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Build the process-wide generator from configuration.
pub fn build_generator(config: &LlmConfig) -> Arc<dyn TextGenerator> {
    match &config.api_key {
        Some(key) => {
            let client = OpenRouterClient::new(
                key.clone(),
                config.base_url.clone(),
                config.requests_per_minute,
                config.timeout,
            );
            Arc::new(OpenRouterGenerator::new(client, config.model.clone()))
        }
        None => {
            tracing::warn!("OPENROUTER_API_KEY not set; narrative generation disabled");
            Arc::new(UnconfiguredGenerator)
        }
    }
}

// ============================================================================
// USAGE TRACKING
// ============================================================================

/// Tracks token usage reported by the provider.
#[derive(Debug, Default)]
pub struct UsageTracker {
    prompt_tokens: AtomicI64,
    completion_tokens: AtomicI64,
    requests: AtomicI64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completion.
    pub fn record(&self, prompt_tokens: i64, completion_tokens: i64) {
        self.prompt_tokens.fetch_add(prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(completion_tokens, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn prompt_tokens(&self) -> i64 {
        self.prompt_tokens.load(Ordering::Relaxed)
    }

    pub fn completion_tokens(&self) -> i64 {
        self.completion_tokens.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> i64 {
        self.requests.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_generator_fails() {
        let generator = UnconfiguredGenerator;
        let request = GenerationRequest {
            slot: "agent_monthly",
            system: "s".to_string(),
            prompt: "p".to_string(),
            max_tokens: 10,
            temperature: 0.3,
        };
        let result = generator.generate(&request).await;
        assert!(matches!(
            result,
            Err(callsight_core::CallsightError::Llm(
                LlmError::ProviderNotConfigured
            ))
        ));
    }

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert!(!config.is_configured());
        assert_eq!(config.model, "x-ai/grok-4.1-fast");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_build_generator_without_key() {
        let generator = build_generator(&LlmConfig::default());
        assert_eq!(generator.model_id(), "unconfigured");
    }

    #[test]
    fn test_config_debug_redacts_key() {
        let config = LlmConfig {
            api_key: Some(SecretString::new("sk-or-v1-abc".into())),
            ..LlmConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-or-v1-abc"));
    }

    #[test]
    fn test_usage_tracker() {
        let tracker = UsageTracker::new();
        tracker.record(100, 40);
        tracker.record(50, 10);
        assert_eq!(tracker.prompt_tokens(), 150);
        assert_eq!(tracker.completion_tokens(), 50);
        assert_eq!(tracker.requests(), 2);
    }
}
