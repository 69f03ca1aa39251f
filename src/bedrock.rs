//! AWS Bedrock gateway transport
//!
//! Text and streaming variants over the Bedrock runtime InvokeModel APIs,
//! with:
//! - the anthropic message envelope (protocol version tag + single user turn)
//! - binary-framed JSON chunk decoding into [`StreamEvent`]s
//! - AWS SigV4 authentication via the AWS SDK

use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::config::{Credentials, Region};
use aws_sdk_bedrockruntime::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_bedrockruntime::primitives::Blob;
use futures_util::Stream;
use serde_json::{json, Value};

use crate::config::{GatewayConfig, FALLBACK_REGION};
use crate::error::DispatchError;
use crate::models::{GatewayInvocationMetrics, InvocationRequest, ProviderFamily, StreamEvent};

/// Protocol version tag the gateway expects in the request envelope.
pub const ENVELOPE_VERSION: &str = "bedrock-2023-05-31";

/// Bedrock runtime client wrapper.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: aws_sdk_bedrockruntime::Client,
}

impl GatewayClient {
    /// Wrap an already-constructed SDK client (dependency injection seam;
    /// tests point this at a local endpoint).
    pub fn new(client: aws_sdk_bedrockruntime::Client) -> Self {
        Self { client }
    }

    /// Build a client from the AWS credential triple.
    ///
    /// Returns `None` when the triple is incomplete: the gateway becomes
    /// unavailable but construction never fails. Callers fall back to an ad
    /// hoc client at invocation time.
    pub async fn from_conf(config: &GatewayConfig) -> Option<Self> {
        if !config.has_credentials() {
            tracing::warn!("gateway credentials missing; foregoing gateway client and continuing");
            return None;
        }
        let credentials = Credentials::new(
            config.access_key_id.clone().unwrap_or_default(),
            config.secret_access_key.clone().unwrap_or_default(),
            config.session_token.clone(),
            None,
            "modelgate-env",
        );
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;
        Some(Self::new(aws_sdk_bedrockruntime::Client::new(&sdk_config)))
    }

    /// Ad hoc default-region client used when no owned client exists. The
    /// provider surfaces any credential failure at call time.
    pub async fn fallback() -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(FALLBACK_REGION))
            .load()
            .await;
        Self::new(aws_sdk_bedrockruntime::Client::new(&sdk_config))
    }

    /// Submit the envelope synchronously and return the raw response body.
    pub async fn invoke(&self, request: &InvocationRequest) -> Result<Value, DispatchError> {
        let body_bytes = envelope_bytes(request)?;
        let response = self
            .client
            .invoke_model()
            .model_id(&request.model.wire_model_id)
            .body(Blob::new(body_bytes))
            .send()
            .await
            .map_err(transport_error)?;

        serde_json::from_slice(response.body().as_ref()).map_err(|e| {
            DispatchError::protocol(
                ProviderFamily::Bedrock,
                format!("undecodable response body: {e}"),
            )
        })
    }

    /// Submit the envelope via the streaming call and decode each chunk into
    /// a [`StreamEvent`]. Unknown chunk types are skipped.
    pub async fn invoke_streaming(
        &self,
        request: &InvocationRequest,
    ) -> Result<impl Stream<Item = Result<StreamEvent, DispatchError>>, DispatchError> {
        let body_bytes = envelope_bytes(request)?;
        let response = self
            .client
            .invoke_model_with_response_stream()
            .model_id(&request.model.wire_model_id)
            .body(Blob::new(body_bytes))
            .send()
            .await
            .map_err(transport_error)?;

        let mut stream = response.body;

        Ok(async_stream::stream! {
            loop {
                match stream.recv().await {
                    Ok(Some(event)) => {
                        use aws_sdk_bedrockruntime::types::ResponseStream;

                        if let ResponseStream::Chunk(chunk) = event {
                            let Some(bytes) = chunk.bytes() else { continue };
                            let chunk_json: Value = match serde_json::from_slice(bytes.as_ref()) {
                                Ok(v) => v,
                                Err(e) => {
                                    yield Err(DispatchError::protocol(
                                        ProviderFamily::Bedrock,
                                        format!("undecodable stream chunk: {e}"),
                                    ));
                                    break;
                                }
                            };
                            match decode_chunk(&chunk_json) {
                                Ok(Some(decoded)) => yield Ok(decoded),
                                Ok(None) => {}
                                Err(e) => {
                                    yield Err(e);
                                    break;
                                }
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(transport_error(e));
                        break;
                    }
                }
            }
        })
    }
}

/// Build the gateway's JSON envelope: protocol version tag, token budget and
/// a single user-role message carrying the prompt.
pub fn envelope(request: &InvocationRequest) -> Value {
    json!({
        "anthropic_version": ENVELOPE_VERSION,
        "max_tokens": request.max_tokens,
        "messages": [
            {
                "role": "user",
                "content": [{"type": "text", "text": request.prompt}],
            }
        ],
    })
}

fn envelope_bytes(request: &InvocationRequest) -> Result<Vec<u8>, DispatchError> {
    serde_json::to_vec(&envelope(request)).map_err(|e| {
        DispatchError::protocol(
            ProviderFamily::Bedrock,
            format!("envelope serialization failed: {e}"),
        )
    })
}

/// Decode one chunk into a [`StreamEvent`]; `None` for chunk types outside
/// the protocol's tagged union.
pub fn decode_chunk(chunk: &Value) -> Result<Option<StreamEvent>, DispatchError> {
    let kind = chunk
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| protocol("stream chunk missing 'type'"))?;

    let event = match kind {
        "content_block_start" => {
            let text = chunk
                .get("content_block")
                .and_then(|b| b.get("text"))
                .and_then(|t| t.as_str())
                .ok_or_else(|| protocol("content_block_start without text"))?;
            StreamEvent::BlockStart {
                text: text.to_string(),
            }
        }
        "content_block_delta" => {
            let text = chunk
                .get("delta")
                .and_then(|d| d.get("text"))
                .and_then(|t| t.as_str())
                .ok_or_else(|| protocol("content_block_delta without text"))?;
            StreamEvent::BlockDelta {
                text: text.to_string(),
            }
        }
        "content_block_stop" => StreamEvent::BlockStop,
        "message_delta" => StreamEvent::MessageDelta,
        "message_stop" => {
            let raw = chunk
                .get("amazon-bedrock-invocationMetrics")
                .ok_or_else(|| protocol("message_stop without invocation metrics"))?;
            let metrics: GatewayInvocationMetrics = serde_json::from_value(raw.clone())
                .map_err(|e| protocol(format!("unreadable invocation metrics: {e}")))?;
            StreamEvent::MessageStop { metrics }
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn protocol(detail: impl Into<String>) -> DispatchError {
    DispatchError::protocol(ProviderFamily::Bedrock, detail)
}

/// Log the provider failure with its error code and message, then surface it
/// unchanged as a transport error.
fn transport_error<E, R>(err: SdkError<E, R>) -> DispatchError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
    R: std::fmt::Debug,
{
    let code = err
        .as_service_error()
        .and_then(|e| e.code())
        .map(str::to_string);
    let message = err
        .as_service_error()
        .and_then(|e| e.message())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{err:?}"));
    tracing::error!(
        code = code.as_deref().unwrap_or("unknown"),
        message = %message,
        "couldn't invoke gateway model"
    );
    DispatchError::Transport {
        provider: ProviderFamily::Bedrock,
        code,
        message,
    }
}
