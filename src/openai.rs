//! OpenAI chat completions transport.
//!
//! Sends a two-message exchange (system + user) and reads back the first
//! completion choice plus the prompt/completion token usage block.

use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::DispatchError;
use crate::models::{InvocationRequest, ProviderFamily};

/// OpenAI API client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self {
            http,
            api_key,
            base_url,
        }
    }

    /// Read key and endpoint from the environment. An absent key is not
    /// validated here; the provider rejects the first call instead.
    pub fn from_env(http: reqwest::Client) -> Self {
        Self::new(http, config::openai_api_key(), config::openai_base_url())
    }

    pub async fn invoke(
        &self,
        request: &InvocationRequest,
    ) -> Result<ChatCompletionResponse, DispatchError> {
        let body = ChatCompletionRequest {
            model: request.model.wire_model_id.clone(),
            messages: vec![
                ChatMessage::new("system", &request.system_prompt),
                ChatMessage::new("user", &request.prompt),
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, model = %request.model.logical_name, "couldn't invoke openai model");
                DispatchError::transport(ProviderFamily::OpenAi, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let (code, message) = parse_error_body(&body_text, status);
            tracing::error!(
                code = code.as_deref().unwrap_or("unknown"),
                message = %message,
                "couldn't invoke openai model"
            );
            return Err(DispatchError::Transport {
                provider: ProviderFamily::OpenAi,
                code,
                message,
            });
        }

        response.json::<ChatCompletionResponse>().await.map_err(|e| {
            DispatchError::protocol(ProviderFamily::OpenAi, format!("undecodable response: {e}"))
        })
    }
}

/// Pull the provider's error code and message out of an error body, falling
/// back to the HTTP status when the body is not the documented shape.
fn parse_error_body(body: &str, status: reqwest::StatusCode) -> (Option<String>, String) {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(error) = value.get("error") {
            let code = error
                .get("code")
                .and_then(|c| c.as_str())
                .or_else(|| error.get("type").and_then(|t| t.as_str()))
                .map(str::to_string);
            if let Some(message) = error.get("message").and_then(|m| m.as_str()) {
                return (code, message.to_string());
            }
        }
    }
    (
        Some(status.as_u16().to_string()),
        format!("HTTP {status}: {body}"),
    )
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: ChatUsage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponseMessage {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_parses_choice_and_usage() {
        let parsed: ChatCompletionResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 21, "completion_tokens": 3, "total_tokens": 24}
        }))
        .unwrap();
        assert_eq!(parsed.choices[0].message.content, "Hi there");
        assert_eq!(parsed.usage.prompt_tokens, 21);
        assert_eq!(parsed.usage.completion_tokens, 3);
    }

    #[test]
    fn error_body_yields_code_and_message() {
        let (code, message) = parse_error_body(
            r#"{"error": {"message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded"}}"#,
            reqwest::StatusCode::TOO_MANY_REQUESTS,
        );
        assert_eq!(code.as_deref(), Some("rate_limit_exceeded"));
        assert_eq!(message, "Rate limit reached");
    }

    #[test]
    fn unrecognized_error_body_falls_back_to_status() {
        let (code, message) =
            parse_error_body("upstream exploded", reqwest::StatusCode::BAD_GATEWAY);
        assert_eq!(code.as_deref(), Some("502"));
        assert!(message.contains("upstream exploded"));
    }
}
