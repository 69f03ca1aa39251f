//! Response normalization.
//!
//! Converts each transport's raw response, or an accumulated stream, into
//! the canonical `(text, UsageMetrics)` pair. No provider-specific key
//! survives past this boundary, and the metrics record is always stamped
//! with the logical model name the caller dispatched on.

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::anthropic::MessagesResponse;
use crate::error::DispatchError;
use crate::models::{GatewayInvocationMetrics, ProviderFamily, StreamEvent, UsageMetrics};
use crate::openai::ChatCompletionResponse;

/// Extract text and usage from a non-streaming gateway response body.
pub fn gateway_text(
    raw: &Value,
    logical_name: &str,
) -> Result<(String, UsageMetrics), DispatchError> {
    let text = raw
        .get("content")
        .and_then(|c| c.as_array())
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("text"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| {
            DispatchError::protocol(ProviderFamily::Bedrock, "response missing content[0].text")
        })?;

    let usage = raw
        .get("usage")
        .ok_or_else(|| DispatchError::protocol(ProviderFamily::Bedrock, "response missing usage"))?;
    let input_tokens = usage_field(usage, "input_tokens")?;
    let output_tokens = usage_field(usage, "output_tokens")?;

    Ok((
        text.to_string(),
        UsageMetrics {
            input_token_count: input_tokens,
            output_token_count: output_tokens,
            model: logical_name.to_string(),
        },
    ))
}

fn usage_field(usage: &Value, key: &str) -> Result<u64, DispatchError> {
    usage.get(key).and_then(|v| v.as_u64()).ok_or_else(|| {
        DispatchError::protocol(ProviderFamily::Bedrock, format!("usage missing {key}"))
    })
}

/// Normalize an OpenAI chat completion.
pub fn openai_chat(
    response: &ChatCompletionResponse,
    logical_name: &str,
) -> Result<(String, UsageMetrics), DispatchError> {
    let choice = response
        .choices
        .first()
        .ok_or_else(|| DispatchError::protocol(ProviderFamily::OpenAi, "no choices in response"))?;

    Ok((
        choice.message.content.clone(),
        UsageMetrics {
            input_token_count: response.usage.prompt_tokens,
            output_token_count: response.usage.completion_tokens,
            model: logical_name.to_string(),
        },
    ))
}

/// Normalize an Anthropic messages response.
pub fn anthropic_messages(
    response: &MessagesResponse,
    logical_name: &str,
) -> Result<(String, UsageMetrics), DispatchError> {
    let block = response.content.first().ok_or_else(|| {
        DispatchError::protocol(ProviderFamily::Anthropic, "no content blocks in response")
    })?;

    Ok((
        block.text.clone(),
        UsageMetrics {
            input_token_count: response.usage.input_tokens,
            output_token_count: response.usage.output_tokens,
            model: logical_name.to_string(),
        },
    ))
}

/// Strict left-fold over a gateway event stream.
///
/// `block_start` and `block_delta` append text (and are forwarded to the
/// progress channel when one is attached); `block_stop` and `message_delta`
/// are no-ops; `message_stop` captures the terminal metrics. A stream that
/// ends without a terminal event finishes with a zeroed metrics record.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    metrics: Option<GatewayInvocationMetrics>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the accumulator.
    pub fn apply(&mut self, event: StreamEvent, progress: Option<&UnboundedSender<String>>) {
        match event {
            StreamEvent::BlockStart { text } | StreamEvent::BlockDelta { text } => {
                if let Some(sender) = progress {
                    // A dropped receiver is not an error; the fold result is
                    // the authoritative output.
                    let _ = sender.send(text.clone());
                }
                self.text.push_str(&text);
            }
            StreamEvent::BlockStop | StreamEvent::MessageDelta => {}
            StreamEvent::MessageStop { metrics } => self.metrics = Some(metrics),
        }
    }

    /// Finish the fold, stamping the logical model name.
    pub fn finish(self, logical_name: &str) -> (String, UsageMetrics) {
        let metrics = self.metrics.unwrap_or_else(|| {
            tracing::warn!(
                model = %logical_name,
                "stream ended without a terminal metrics event; defaulting to an empty record"
            );
            GatewayInvocationMetrics::default()
        });
        (
            self.text,
            UsageMetrics {
                input_token_count: metrics.input_token_count,
                output_token_count: metrics.output_token_count,
                model: logical_name.to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_events() -> Vec<StreamEvent> {
        vec![
            StreamEvent::BlockStart {
                text: "Hel".to_string(),
            },
            StreamEvent::BlockDelta {
                text: "lo".to_string(),
            },
            StreamEvent::BlockStop,
            StreamEvent::MessageDelta,
            StreamEvent::MessageStop {
                metrics: GatewayInvocationMetrics {
                    input_token_count: 9,
                    output_token_count: 4,
                    invocation_latency: Some(100),
                    first_byte_latency: Some(10),
                },
            },
        ]
    }

    #[test]
    fn gateway_text_extracts_first_block_and_usage() {
        let raw = json!({
            "content": [{"type": "text", "text": "Hello"}],
            "usage": {"input_tokens": 9, "output_tokens": 4}
        });
        let (text, metrics) = gateway_text(&raw, "bedrock-sonnet").unwrap();
        assert_eq!(text, "Hello");
        assert_eq!(metrics.input_token_count, 9);
        assert_eq!(metrics.output_token_count, 4);
        assert_eq!(metrics.model, "bedrock-sonnet");
    }

    #[test]
    fn gateway_text_flags_missing_fields() {
        let raw = json!({"usage": {"input_tokens": 1, "output_tokens": 1}});
        assert!(matches!(
            gateway_text(&raw, "bedrock-sonnet"),
            Err(DispatchError::Protocol { .. })
        ));

        let raw = json!({"content": [{"type": "text", "text": "hi"}]});
        assert!(matches!(
            gateway_text(&raw, "bedrock-sonnet"),
            Err(DispatchError::Protocol { .. })
        ));
    }

    #[test]
    fn fold_accumulates_text_in_arrival_order() {
        let mut acc = StreamAccumulator::new();
        for event in sample_events() {
            acc.apply(event, None);
        }
        let (text, metrics) = acc.finish("bedrock-sonnet");
        assert_eq!(text, "Hello");
        assert_eq!(metrics.input_token_count, 9);
        assert_eq!(metrics.output_token_count, 4);
        assert_eq!(metrics.model, "bedrock-sonnet");
    }

    #[test]
    fn fold_matches_non_streaming_text() {
        // Round-trip parity: the same content through either transport shape
        // yields the same text.
        let raw = json!({
            "content": [{"type": "text", "text": "Hello"}],
            "usage": {"input_tokens": 9, "output_tokens": 4}
        });
        let (direct_text, _) = gateway_text(&raw, "bedrock-sonnet").unwrap();

        let mut acc = StreamAccumulator::new();
        for event in sample_events() {
            acc.apply(event, None);
        }
        let (folded_text, _) = acc.finish("bedrock-sonnet");
        assert_eq!(direct_text, folded_text);
    }

    #[test]
    fn fold_without_terminal_event_defaults_to_empty_metrics() {
        let mut acc = StreamAccumulator::new();
        acc.apply(
            StreamEvent::BlockStart {
                text: "partial".to_string(),
            },
            None,
        );
        let (text, metrics) = acc.finish("bedrock-haiku");
        assert_eq!(text, "partial");
        assert_eq!(metrics.input_token_count, 0);
        assert_eq!(metrics.output_token_count, 0);
        assert_eq!(metrics.model, "bedrock-haiku");
    }

    #[tokio::test]
    async fn fold_forwards_fragments_to_the_progress_channel() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut acc = StreamAccumulator::new();
        for event in sample_events() {
            acc.apply(event, Some(&tx));
        }
        drop(tx);

        let mut fragments = Vec::new();
        while let Some(fragment) = rx.recv().await {
            fragments.push(fragment);
        }
        assert_eq!(fragments, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[test]
    fn normalized_metrics_use_the_logical_name() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "hi"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1}
        }))
        .unwrap();
        let (_, metrics) = openai_chat(&response, "gpt-4o").unwrap();
        assert_eq!(metrics.model, "gpt-4o");

        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "hi"}],
            "usage": {"input_tokens": 3, "output_tokens": 1}
        }))
        .unwrap();
        let (_, metrics) = anthropic_messages(&response, "anthropic-opus").unwrap();
        // Logical alias, not the dated wire id.
        assert_eq!(metrics.model, "anthropic-opus");
    }

    #[test]
    fn empty_choice_lists_are_protocol_errors() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [],
            "usage": {"prompt_tokens": 0, "completion_tokens": 0}
        }))
        .unwrap();
        assert!(matches!(
            openai_chat(&response, "gpt-4o"),
            Err(DispatchError::Protocol { .. })
        ));
    }
}
