//! Metrics wrapper around the text generator.

use async_trait::async_trait;
use callsight_core::CallsightResult;
use callsight_llm::{GenerationRequest, TextGenerator};
use std::sync::Arc;
use std::time::Instant;

use super::metrics::METRICS;

/// Records a counter and latency sample for every generation call, labelled
/// by prompt slot.
pub struct InstrumentedGenerator {
    inner: Arc<dyn TextGenerator>,
}

impl InstrumentedGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TextGenerator for InstrumentedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> CallsightResult<String> {
        let start = Instant::now();
        let result = self.inner.generate(request).await;
        let elapsed = start.elapsed();

        if let Ok(m) = METRICS.as_ref() {
            m.record_generation(request.slot, result.is_ok(), elapsed.as_secs_f64());
        }
        if let Err(err) = &result {
            tracing::warn!(
                slot = request.slot,
                model = self.inner.model_id(),
                error = %err,
                duration_ms = elapsed.as_millis(),
                "Text generation failed"
            );
        }
        result
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
