//! OpenRouter text-generation provider

use super::client::OpenRouterClient;
use super::types::{CompletionRequest, CompletionResponse, Message};
use crate::providers::invalid_response;
use crate::{GenerationRequest, TextGenerator, UsageTracker};
use async_trait::async_trait;
use callsight_core::CallsightResult;
use std::sync::Arc;

/// Chat-completions generator backed by OpenRouter.
pub struct OpenRouterGenerator {
    client: OpenRouterClient,
    model: String,
    usage: Arc<UsageTracker>,
}

impl OpenRouterGenerator {
    /// Create a new generator.
    ///
    /// # Arguments
    /// * `client` - Configured OpenRouter client
    /// * `model` - Model slug (e.g., "x-ai/grok-4.1-fast")
    pub fn new(client: OpenRouterClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            usage: Arc::new(UsageTracker::new()),
        }
    }

    /// Token usage recorded by this generator.
    pub fn usage(&self) -> Arc<UsageTracker> {
        self.usage.clone()
    }

    fn build_request(&self, request: &GenerationRequest) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(request.system.clone()),
                Message::user(request.prompt.clone()),
            ],
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenRouterGenerator {
    async fn generate(&self, request: &GenerationRequest) -> CallsightResult<String> {
        let body = self.build_request(request);
        let response: CompletionResponse = self.client.request("chat/completions", body).await?;

        if let Some(usage) = &response.usage {
            self.usage
                .record(usage.prompt_tokens, usage.completion_tokens.unwrap_or(0));
        }

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| invalid_response("openrouter", "No completion in response"))?;

        Ok(text)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenRouterGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterGenerator")
            .field("model", &self.model)
            .finish()
    }
}
