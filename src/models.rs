//! Core data model shared by the router, transports and dispatch facade.
//!
//! Everything provider-facing stays inside the transport modules; the types
//! here are the provider-agnostic contract the rest of the crate (and
//! downstream callers) program against.

use serde::{Deserialize, Serialize};

/// System prompt used by the chat providers when the caller supplies none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful chatbot.";

/// Provider family a logical model name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderFamily {
    /// AWS Bedrock runtime (text and streaming transports).
    Bedrock,
    /// OpenAI chat completions API.
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
    /// In-process model runtime loaded from a weights path.
    Local,
}

impl std::fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderFamily::Bedrock => "bedrock",
            ProviderFamily::OpenAi => "openai",
            ProviderFamily::Anthropic => "anthropic",
            ProviderFamily::Local => "local",
        };
        f.write_str(name)
    }
}

/// Resolved model identity: the caller-facing logical name, the family that
/// serves it, and the identifier that goes on the wire.
///
/// For [`ProviderFamily::Local`] the wire id is the filesystem path to the
/// model weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub logical_name: String,
    pub family: ProviderFamily,
    pub wire_model_id: String,
}

/// A single invocation as handed to a transport. Built per call, never
/// persisted.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub prompt: String,
    pub model: ModelSpec,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
    pub stream: bool,
}

/// Provider-agnostic usage accounting record.
///
/// The serialized field names keep the gateway's camelCase spelling so a
/// recorded metrics document round-trips with existing cost tooling. `model`
/// is always the logical name the caller dispatched on, never a provider's
/// internal dated identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    #[serde(rename = "inputTokenCount")]
    pub input_token_count: u64,
    #[serde(rename = "outputTokenCount")]
    pub output_token_count: u64,
    pub model: String,
}

/// What a `send` returns: the generated text, plus usage metrics unless the
/// caller opted out (or the provider family does not produce canonical
/// metrics, as with local models).
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub text: String,
    pub metrics: Option<UsageMetrics>,
}

/// Decoded gateway streaming event. Exists only while a stream is being
/// folded into an [`InvocationResult`]; discarded afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// First fragment of a content block.
    BlockStart { text: String },
    /// Incremental fragment of the current content block.
    BlockDelta { text: String },
    /// End of a content block. No text contribution.
    BlockStop,
    /// Message-level delta. No text contribution.
    MessageDelta,
    /// Terminal event carrying the gateway's invocation metrics.
    MessageStop { metrics: GatewayInvocationMetrics },
}

/// Gateway-native invocation metrics as delivered in the terminal streaming
/// chunk. Defaults to a zeroed record when the stream ends without one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayInvocationMetrics {
    #[serde(default)]
    pub input_token_count: u64,
    #[serde(default)]
    pub output_token_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_latency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_byte_latency: Option<u64>,
}
