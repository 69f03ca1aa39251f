//! Anthropic messages transport.
//!
//! Sends the system prompt as a top-level field plus a single user message,
//! and reads back the first content block's text and the input/output token
//! usage block.

use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::DispatchError;
use crate::models::{InvocationRequest, ProviderFamily};

const API_VERSION: &str = "2023-06-01";

/// Anthropic API client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
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
        Self::new(
            http,
            config::anthropic_api_key(),
            config::anthropic_base_url(),
        )
    }

    pub async fn invoke(
        &self,
        request: &InvocationRequest,
    ) -> Result<MessagesResponse, DispatchError> {
        let body = MessagesRequest {
            model: request.model.wire_model_id.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system_prompt.clone(),
            messages: vec![UserMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        };
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, model = %request.model.logical_name, "couldn't invoke anthropic model");
                DispatchError::transport(ProviderFamily::Anthropic, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let (code, message) = parse_error_body(&body_text, status);
            tracing::error!(
                code = code.as_deref().unwrap_or("unknown"),
                message = %message,
                "couldn't invoke anthropic model"
            );
            return Err(DispatchError::Transport {
                provider: ProviderFamily::Anthropic,
                code,
                message,
            });
        }

        response.json::<MessagesResponse>().await.map_err(|e| {
            DispatchError::protocol(
                ProviderFamily::Anthropic,
                format!("undecodable response: {e}"),
            )
        })
    }
}

/// Error bodies look like `{"type": "error", "error": {"type": ..., "message": ...}}`.
fn parse_error_body(body: &str, status: reqwest::StatusCode) -> (Option<String>, String) {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(error) = value.get("error") {
            let code = error
                .get("type")
                .and_then(|t| t.as_str())
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
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<UserMessage>,
}

#[derive(Debug, Serialize)]
struct UserMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    pub usage: MessagesUsage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_parses_first_block_and_usage() {
        let parsed: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Hello!"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 11, "output_tokens": 2}
        }))
        .unwrap();
        assert_eq!(parsed.content[0].text, "Hello!");
        assert_eq!(parsed.usage.input_tokens, 11);
        assert_eq!(parsed.usage.output_tokens, 2);
    }

    #[test]
    fn error_body_yields_type_and_message() {
        let (code, message) = parse_error_body(
            r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#,
            reqwest::StatusCode::SERVICE_UNAVAILABLE,
        );
        assert_eq!(code.as_deref(), Some("overloaded_error"));
        assert_eq!(message, "Overloaded");
    }
}
