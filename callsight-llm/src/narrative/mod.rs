//! Narrative Engine
//!
//! Turns windowed call corpora into period narratives and folds each new
//! period narrative into an entity's cumulative narrative. Every call to the
//! model is bounded by a timeout; a timeout counts as a failed generation.

mod parser;
mod prompts;

pub use parser::{DelimitedSectionParser, MergeResponseParser, ParsedMerge};
pub use prompts::{MergeSubject, PeriodSlot, NO_PREVIOUS_HISTORY};

use crate::{GenerationRequest, LlmConfig, TextGenerator};
use std::sync::Arc;
use std::time::Duration;

/// Change summary reported when the merge call fails outright.
pub const MERGE_FAILED_SUMMARY: &str = "Could not generate update.";

/// Change summary reported when the merge response cannot be parsed.
pub const MERGE_UNPARSED_SUMMARY: &str = "Error parsing change summary.";

/// Tunables for the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeConfig {
    pub timeout: Duration,
    /// Maximum corpus lines sent in one prompt.
    pub corpus_limit: usize,
    pub temperature: f32,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            corpus_limit: 50,
            temperature: 0.3,
        }
    }
}

impl NarrativeConfig {
    pub fn from_llm(config: &LlmConfig, corpus_limit: usize) -> Self {
        Self {
            timeout: config.timeout,
            corpus_limit: corpus_limit.max(1),
            ..Self::default()
        }
    }
}

/// How a merge concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    /// The model answered without the section markers; its raw text was
    /// kept as the new narrative.
    Unparsed,
    /// No usable answer; the previous narrative was kept.
    GenerationFailed,
}

/// Result of folding a period narrative into the cumulative narrative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedNarrative {
    pub overall: Option<String>,
    pub change_summary: String,
    pub outcome: MergeOutcome,
}

/// Summarize-and-merge engine over a [`TextGenerator`].
pub struct NarrativeEngine {
    generator: Arc<dyn TextGenerator>,
    parser: Arc<dyn MergeResponseParser>,
    config: NarrativeConfig,
}

impl NarrativeEngine {
    pub fn new(generator: Arc<dyn TextGenerator>, config: NarrativeConfig) -> Self {
        Self {
            generator,
            parser: Arc::new(DelimitedSectionParser::default()),
            config,
        }
    }

    /// Replace the merge-response parser.
    pub fn with_parser(mut self, parser: Arc<dyn MergeResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &NarrativeConfig {
        &self.config
    }

    pub fn model_id(&self) -> &str {
        self.generator.model_id()
    }

    /// Generate a period narrative from corpus lines, most relevant first.
    ///
    /// Only the first `corpus_limit` lines are sent. Returns `None` when the
    /// model fails, times out, or answers with empty text.
    pub async fn summarize_period(
        &self,
        slot: PeriodSlot,
        subject: &str,
        lines: &[String],
    ) -> Option<String> {
        let corpus = lines
            .iter()
            .take(self.config.corpus_limit)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");

        let request = GenerationRequest {
            slot: slot.label(),
            system: slot.system_prompt().to_string(),
            prompt: slot.render(subject, &corpus),
            max_tokens: slot.max_tokens(),
            temperature: self.config.temperature,
        };

        self.generate(&request).await
    }

    /// Fold `period` into `previous`, producing the updated narrative and a
    /// change summary. Never fails: a failed call keeps `previous`, and an
    /// answer without section markers becomes the new narrative verbatim.
    pub async fn merge(
        &self,
        subject: MergeSubject,
        previous: Option<&str>,
        period: &str,
    ) -> MergedNarrative {
        let previous_text = previous
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(NO_PREVIOUS_HISTORY);

        let request = GenerationRequest {
            slot: subject.label(),
            system: subject.system_prompt().to_string(),
            prompt: subject.render(previous_text, period),
            max_tokens: subject.max_tokens(),
            temperature: self.config.temperature,
        };

        let Some(raw) = self.generate(&request).await else {
            return MergedNarrative {
                overall: previous.map(str::to_string),
                change_summary: MERGE_FAILED_SUMMARY.to_string(),
                outcome: MergeOutcome::GenerationFailed,
            };
        };

        match self.parser.parse(&raw) {
            ParsedMerge::Sections {
                overall,
                change_summary,
            } => MergedNarrative {
                overall: Some(overall),
                change_summary,
                outcome: MergeOutcome::Merged,
            },
            ParsedMerge::Unparsed => {
                tracing::warn!(
                    slot = request.slot,
                    preview = %raw.chars().take(100).collect::<String>(),
                    "Merge response missing section markers"
                );
                MergedNarrative {
                    overall: Some(raw),
                    change_summary: MERGE_UNPARSED_SUMMARY.to_string(),
                    outcome: MergeOutcome::Unparsed,
                }
            }
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Option<String> {
        match tokio::time::timeout(self.config.timeout, self.generator.generate(request)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::warn!(slot = request.slot, "Text generation returned empty output");
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(slot = request.slot, error = %e, "Text generation failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    slot = request.slot,
                    after_ms = self.config.timeout.as_millis() as u64,
                    "Text generation timed out"
                );
                None
            }
        }
    }
}

impl std::fmt::Debug for NarrativeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrativeEngine")
            .field("model", &self.generator.model_id())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use callsight_core::{CallsightResult, LlmError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned answers and records every prompt it receives.
    #[derive(Default)]
    struct CannedGenerator {
        answers: Mutex<VecDeque<CallsightResult<String>>>,
        prompts: Mutex<Vec<GenerationRequest>>,
        delay: Option<Duration>,
    }

    impl CannedGenerator {
        fn with(answers: Vec<CallsightResult<String>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                ..Self::default()
            }
        }

        fn prompts(&self) -> Vec<GenerationRequest> {
            self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, request: &GenerationRequest) -> CallsightResult<String> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(request.clone());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.answers.lock().ok().and_then(|mut a| a.pop_front());
            next.unwrap_or_else(|| Err(LlmError::ProviderNotConfigured.into()))
        }

        fn model_id(&self) -> &str {
            "canned"
        }
    }

    fn engine(generator: Arc<CannedGenerator>) -> NarrativeEngine {
        NarrativeEngine::new(generator, NarrativeConfig::default())
    }

    #[tokio::test]
    async fn test_summarize_caps_corpus() {
        let generator = Arc::new(CannedGenerator::with(vec![Ok("  Solid month. ".to_string())]));
        let engine = engine(generator.clone());
        let lines: Vec<String> = (0..80).map(|i| format!("- line {i}")).collect();

        let text = engine
            .summarize_period(PeriodSlot::AgentMonthly, "Asha", &lines)
            .await;
        assert_eq!(text.as_deref(), Some("Solid month."));

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].prompt.contains("- line 49"));
        assert!(!prompts[0].prompt.contains("- line 50"));
        assert_eq!(prompts[0].system, "You are a QA Supervisor for a Call Center.");
    }

    #[tokio::test]
    async fn test_summarize_failure_and_empty_are_none() {
        let generator = Arc::new(CannedGenerator::with(vec![
            Err(LlmError::ProviderNotConfigured.into()),
            Ok("   ".to_string()),
        ]));
        let engine = engine(generator);
        let lines = vec!["- Call: x".to_string()];
        assert!(engine
            .summarize_period(PeriodSlot::CityDailyOps, "Pune", &lines)
            .await
            .is_none());
        assert!(engine
            .summarize_period(PeriodSlot::CityDailyOps, "Pune", &lines)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_summarize_timeout_is_none() {
        let generator = Arc::new(CannedGenerator {
            answers: Mutex::new(VecDeque::from(vec![Ok("late".to_string())])),
            delay: Some(Duration::from_millis(200)),
            ..CannedGenerator::default()
        });
        let engine = NarrativeEngine::new(
            generator,
            NarrativeConfig {
                timeout: Duration::from_millis(20),
                ..NarrativeConfig::default()
            },
        );
        let text = engine
            .summarize_period(PeriodSlot::CityMonthly, "Pune", &["- a".to_string()])
            .await;
        assert!(text.is_none());
    }

    #[tokio::test]
    async fn test_merge_parses_sections() {
        let generator = Arc::new(CannedGenerator::with(vec![Ok(
            "[OVERALL_START]Reliable.[OVERALL_END]\n[CHANGE_START]Faster closings.[CHANGE_END]"
                .to_string(),
        )]));
        let engine = engine(generator.clone());
        let merged = engine.merge(MergeSubject::Agent, None, "Good month").await;
        assert_eq!(
            merged,
            MergedNarrative {
                overall: Some("Reliable.".to_string()),
                change_summary: "Faster closings.".to_string(),
                outcome: MergeOutcome::Merged,
            }
        );
        assert!(generator.prompts()[0].prompt.contains(NO_PREVIOUS_HISTORY));
    }

    #[tokio::test]
    async fn test_merge_without_markers_keeps_raw_text() {
        let raw = "The agent keeps improving on empathy.";
        let generator = Arc::new(CannedGenerator::with(vec![Ok(raw.to_string())]));
        let merged = engine(generator)
            .merge(MergeSubject::City, Some("Old profile"), "New month")
            .await;
        assert_eq!(merged.overall.as_deref(), Some(raw));
        assert_eq!(merged.change_summary, MERGE_UNPARSED_SUMMARY);
        assert_eq!(merged.outcome, MergeOutcome::Unparsed);
    }

    #[tokio::test]
    async fn test_merge_failure_keeps_previous() {
        let generator = Arc::new(CannedGenerator::with(vec![Err(LlmError::RequestFailed {
            provider: "openrouter".to_string(),
            status: 502,
            message: "bad gateway".to_string(),
        }
        .into())]));
        let merged = engine(generator)
            .merge(MergeSubject::Agent, Some("Old profile"), "New month")
            .await;
        assert_eq!(merged.overall.as_deref(), Some("Old profile"));
        assert_eq!(merged.change_summary, MERGE_FAILED_SUMMARY);
        assert_eq!(merged.outcome, MergeOutcome::GenerationFailed);
    }
}
