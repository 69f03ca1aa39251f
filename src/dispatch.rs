//! Dispatch Facade
//!
//! The single entry point over the provider transports. `send` resolves the
//! logical model name, invokes the matching transport, normalizes the
//! response, forwards gateway usage to the ledger and returns text with or
//! without metrics per the caller's preference.
//!
//! One synchronous provider call per invocation; the only state carried
//! across calls is the lazily-loaded local model handle and the ledger
//! handle. Callers needing multi-threaded access add their own
//! synchronization around a shared dispatcher.

use std::sync::Arc;

use futures_util::{pin_mut, StreamExt};
use tokio::sync::mpsc::UnboundedSender;

use crate::anthropic::AnthropicClient;
use crate::bedrock::GatewayClient;
use crate::config::GatewayConfig;
use crate::error::DispatchError;
use crate::ledger::{InMemoryLedger, UsageLedger};
use crate::local::LocalRuntime;
use crate::models::{
    InvocationRequest, InvocationResult, ProviderFamily, DEFAULT_SYSTEM_PROMPT,
};
use crate::normalize::{self, StreamAccumulator};
use crate::openai::OpenAiClient;
use crate::{router, util};

/// Per-call knobs for [`ModelDispatcher::send`].
pub struct SendOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Use the streaming transport where the family has one (gateway only).
    pub stream: bool,
    /// When false, `send` returns text without a metrics record. Gateway
    /// usage is still forwarded to the ledger.
    pub include_metrics: bool,
    /// System prompt for the chat providers; `None` uses the default.
    pub system_prompt: Option<String>,
    /// Streaming progress: each text fragment is sent as it arrives.
    pub progress: Option<UnboundedSender<String>>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.5,
            stream: true,
            include_metrics: true,
            system_prompt: None,
            progress: None,
        }
    }
}

/// Owns the transport handles and the usage ledger.
pub struct ModelDispatcher {
    gateway: Option<GatewayClient>,
    openai: OpenAiClient,
    anthropic: AnthropicClient,
    local: LocalRuntime,
    ledger: Arc<dyn UsageLedger>,
}

impl ModelDispatcher {
    /// Assemble a dispatcher from already-constructed transports.
    ///
    /// `gateway` may be `None` (missing credentials); gateway-routed calls
    /// then go through a default-region fallback client built at call time.
    pub fn new(
        gateway: Option<GatewayClient>,
        openai: OpenAiClient,
        anthropic: AnthropicClient,
        local: LocalRuntime,
        ledger: Arc<dyn UsageLedger>,
    ) -> Self {
        Self {
            gateway,
            openai,
            anthropic,
            local,
            ledger,
        }
    }

    /// Default wiring: transports configured from the environment and an
    /// in-memory usage ledger.
    pub async fn from_env() -> Self {
        let http = util::build_http_client_from_env();
        let gateway = GatewayClient::from_conf(&GatewayConfig::from_env()).await;
        Self::new(
            gateway,
            OpenAiClient::from_env(http.clone()),
            AnthropicClient::from_env(http),
            LocalRuntime::new(),
            Arc::new(InMemoryLedger::new()),
        )
    }

    /// Swap the ledger collaborator (builder style).
    pub fn with_ledger(mut self, ledger: Arc<dyn UsageLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Dispatch one prompt to the given logical model.
    pub async fn send(
        &self,
        prompt: &str,
        model: &str,
        options: SendOptions,
    ) -> Result<InvocationResult, DispatchError> {
        tracing::info!(model, "sending prompt");
        tracing::debug!(
            prompt_len = prompt.len(),
            estimated_tokens = util::estimate_tokens(prompt),
            "prompt diagnostics"
        );

        let spec = router::resolve(model)?;
        let request = InvocationRequest {
            prompt: prompt.to_string(),
            model: spec.clone(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            system_prompt: options
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            stream: options.stream,
        };

        let (text, metrics) = match spec.family {
            ProviderFamily::Bedrock => {
                let client = self.gateway_client().await;
                let (text, metrics) = if options.stream {
                    let stream = client.invoke_streaming(&request).await?;
                    pin_mut!(stream);
                    let mut acc = StreamAccumulator::new();
                    while let Some(event) = stream.next().await {
                        acc.apply(event?, options.progress.as_ref());
                    }
                    acc.finish(&spec.logical_name)
                } else {
                    let raw = client.invoke(&request).await?;
                    normalize::gateway_text(&raw, &spec.logical_name)?
                };
                // Gateway-routed calls are always cost-tracked, independent
                // of the caller's metrics preference.
                self.ledger.record(&metrics);
                (text, Some(metrics))
            }
            ProviderFamily::OpenAi => {
                let response = self.openai.invoke(&request).await?;
                let (text, metrics) = normalize::openai_chat(&response, &spec.logical_name)?;
                (text, Some(metrics))
            }
            ProviderFamily::Anthropic => {
                let response = self.anthropic.invoke(&request).await?;
                let (text, metrics) = normalize::anthropic_messages(&response, &spec.logical_name)?;
                (text, Some(metrics))
            }
            ProviderFamily::Local => {
                // Native usage only; no canonical metrics for local calls.
                let completion = self.local.invoke(&request).await?;
                (completion.text, None)
            }
        };

        Ok(InvocationResult {
            text,
            metrics: if options.include_metrics {
                metrics
            } else {
                None
            },
        })
    }

    async fn gateway_client(&self) -> GatewayClient {
        match &self.gateway {
            Some(client) => client.clone(),
            None => {
                tracing::debug!("no owned gateway client; constructing default-region fallback");
                GatewayClient::fallback().await
            }
        }
    }

    /// Direct transport access for advanced callers.
    pub fn openai(&self) -> &OpenAiClient {
        &self.openai
    }

    pub fn anthropic(&self) -> &AnthropicClient {
        &self.anthropic
    }

    pub fn local(&self) -> &LocalRuntime {
        &self.local
    }

    pub fn ledger(&self) -> &Arc<dyn UsageLedger> {
        &self.ledger
    }
}
