#![forbid(unsafe_code)]
#![doc = r#"
Modelgate

Unified dispatch layer over multiple LLM providers: one `send` call routes a
logical model name to the right transport, normalizes the response into a
single (text, usage-metrics) contract, and feeds gateway usage into a
pluggable ledger.

Crate highlights
- Facade: `ModelDispatcher::send(prompt, model, options)` for routed calls.
- Transports: AWS Bedrock runtime (text + streaming), OpenAI chat
  completions, Anthropic messages, and a local GGUF runtime, each usable
  directly by advanced callers.
- Metrics: `UsageMetrics` always carries the logical model name, never a
  provider's internal dated identifier.

Modules
- `models`: Provider-agnostic data model.
- `router`: Logical name → provider family + wire model id.
- `bedrock` / `openai` / `anthropic` / `local`: Per-provider transports.
- `normalize`: Raw responses and event streams → canonical results.
- `ledger`: Usage-ingest interface plus an in-memory accumulator.
- `dispatch`: The facade tying it all together.
- `util`: Shared helpers (tracing, env, HTTP client).
"#]

pub mod anthropic;
pub mod bedrock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod local;
pub mod models;
pub mod normalize;
pub mod openai;
pub mod router;
pub mod util;

// Re-export the primary surface for ergonomic library use.
pub use crate::anthropic::AnthropicClient;
pub use crate::bedrock::GatewayClient;
pub use crate::dispatch::{ModelDispatcher, SendOptions};
pub use crate::error::DispatchError;
pub use crate::ledger::{InMemoryLedger, ModelTotals, UsageLedger};
pub use crate::local::{LocalCompletion, LocalRuntime, LocalUsage};
pub use crate::models::{
    GatewayInvocationMetrics, InvocationRequest, InvocationResult, ModelSpec, ProviderFamily,
    StreamEvent, UsageMetrics,
};
pub use crate::openai::OpenAiClient;
pub use crate::router::resolve;
