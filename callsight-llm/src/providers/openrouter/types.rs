//! OpenRouter chat-completion request and response types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message. Some upstream models return `null` content.
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: i64,
    pub completion_tokens: Option<i64>,
    pub total_tokens: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_with_null_content() -> Result<(), serde_json::Error> {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null},"finish_reason":"stop"}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw)?;
        assert_eq!(parsed.choices.len(), 1);
        assert!(parsed.choices[0].message.content.is_none());
        assert!(parsed.usage.is_none());
        Ok(())
    }

    #[test]
    fn test_error_with_numeric_code() -> Result<(), serde_json::Error> {
        let raw = r#"{"error":{"message":"No auth credentials found","code":401}}"#;
        let parsed: ApiError = serde_json::from_str(raw)?;
        assert_eq!(parsed.error.message, "No auth credentials found");
        Ok(())
    }

    #[test]
    fn test_request_skips_empty_options() -> Result<(), serde_json::Error> {
        let req = CompletionRequest {
            model: "x-ai/grok-4.1-fast".to_string(),
            messages: vec![Message::system("s"), Message::user("u")],
            max_tokens: None,
            temperature: Some(0.3),
        };
        let value = serde_json::to_value(&req)?;
        assert!(value.get("max_tokens").is_none());
        assert_eq!(value["messages"][1]["role"], "user");
        Ok(())
    }
}
