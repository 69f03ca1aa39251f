//! Local model runtime.
//!
//! Loads a GGUF llama-family model from the filesystem path carried in the
//! model name, on first invocation only, and keeps the loaded instance for
//! the lifetime of the owning dispatcher. Inference runs in process with the
//! prompt echoed into the result text.
//!
//! Usage stays in the runtime's native `prompt_tokens`/`completion_tokens`
//! shape; this transport does not produce the canonical metrics record.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;
use tokio::sync::OnceCell;

use crate::error::DispatchError;
use crate::models::{InvocationRequest, ProviderFamily};

/// Fixed sampling seed: local completions are reproducible for a given
/// prompt and temperature.
const SAMPLE_SEED: u64 = 299792458;

/// Runtime-native usage record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Completion returned by the local runtime: echoed prompt + generated text,
/// plus native usage.
#[derive(Debug, Clone)]
pub struct LocalCompletion {
    pub text: String,
    pub usage: LocalUsage,
}

/// Lazily-initialized local inference runtime. One weights file per runtime
/// instance; whichever path is dispatched first wins the slot.
#[derive(Default)]
pub struct LocalRuntime {
    model: OnceCell<LoadedModel>,
}

impl LocalRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the weights have been loaded yet.
    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Run a completion, loading the model first if this is the initial call.
    pub async fn invoke(
        &self,
        request: &InvocationRequest,
    ) -> Result<LocalCompletion, DispatchError> {
        let weights_path = PathBuf::from(&request.model.wire_model_id);
        let model = self
            .model
            .get_or_try_init(|| async {
                tracing::info!(path = %weights_path.display(), "One moment, loading model...");
                let started = Instant::now();
                let loaded = LoadedModel::load(&weights_path)?;
                tracing::info!("Loaded after {:.2} seconds", started.elapsed().as_secs_f64());
                Ok::<_, DispatchError>(loaded)
            })
            .await?;

        model.complete(request).map_err(|e| {
            tracing::error!(error = %e, "couldn't invoke local model");
            e
        })
    }
}

struct LoadedModel {
    weights: Mutex<ModelWeights>,
    tokenizer: Tokenizer,
    device: Device,
    eos_token: u32,
}

impl LoadedModel {
    fn load(weights_path: &Path) -> Result<Self, DispatchError> {
        let device = pick_device()?;

        let mut file = std::fs::File::open(weights_path).map_err(|e| {
            transport(format!(
                "couldn't open model weights at {}: {e}",
                weights_path.display()
            ))
        })?;
        let content = gguf_file::Content::read(&mut file)
            .map_err(|e| transport(format!("couldn't read gguf weights: {e}")))?;
        let weights = ModelWeights::from_gguf(content, &mut file, &device)
            .map_err(|e| transport(format!("couldn't build model from weights: {e}")))?;

        // The tokenizer definition is expected next to the weights file.
        let tokenizer_path = weights_path.with_file_name("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            transport(format!(
                "couldn't load tokenizer at {}: {e}",
                tokenizer_path.display()
            ))
        })?;
        let eos_token = tokenizer.token_to_id("</s>").unwrap_or(2);

        Ok(Self {
            weights: Mutex::new(weights),
            tokenizer,
            device,
            eos_token,
        })
    }

    fn complete(&self, request: &InvocationRequest) -> Result<LocalCompletion, DispatchError> {
        let encoding = self
            .tokenizer
            .encode(request.prompt.as_str(), true)
            .map_err(|e| {
                DispatchError::protocol(
                    ProviderFamily::Local,
                    format!("prompt tokenization failed: {e}"),
                )
            })?;
        let prompt_tokens = encoding.get_ids().to_vec();

        let mut weights = self.weights.lock().expect("local model mutex poisoned");
        let mut logits_processor =
            LogitsProcessor::new(SAMPLE_SEED, Some(request.temperature as f64), None);

        // Full prompt pass, then one token at a time.
        let input = Tensor::new(prompt_tokens.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(infer_error)?;
        let logits = weights.forward(&input, 0).map_err(infer_error)?;
        let logits = logits.squeeze(0).map_err(infer_error)?;
        let mut next = logits_processor.sample(&logits).map_err(infer_error)?;

        let mut generated: Vec<u32> = Vec::new();
        for index in 0..request.max_tokens as usize {
            if next == self.eos_token {
                break;
            }
            generated.push(next);

            let input = Tensor::new(&[next], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(infer_error)?;
            let logits = weights
                .forward(&input, prompt_tokens.len() + index)
                .map_err(infer_error)?;
            let logits = logits.squeeze(0).map_err(infer_error)?;
            next = logits_processor.sample(&logits).map_err(infer_error)?;
        }

        let completion = self.tokenizer.decode(&generated, true).map_err(|e| {
            DispatchError::protocol(
                ProviderFamily::Local,
                format!("completion decode failed: {e}"),
            )
        })?;

        // Echo is on: the result text carries the prompt followed by the
        // completion, matching the runtime's completion contract.
        let text = format!("{}{}", request.prompt, completion);
        let usage = LocalUsage {
            prompt_tokens: prompt_tokens.len(),
            completion_tokens: generated.len(),
            total_tokens: prompt_tokens.len() + generated.len(),
        };
        Ok(LocalCompletion { text, usage })
    }
}

fn pick_device() -> Result<Device, DispatchError> {
    if candle_core::utils::cuda_is_available() {
        Device::new_cuda(0).map_err(infer_error)
    } else if candle_core::utils::metal_is_available() {
        Device::new_metal(0).map_err(infer_error)
    } else {
        Ok(Device::Cpu)
    }
}

fn transport(message: String) -> DispatchError {
    tracing::error!(message = %message, "couldn't prepare local model");
    DispatchError::transport(ProviderFamily::Local, message)
}

fn infer_error(e: candle_core::Error) -> DispatchError {
    DispatchError::transport(ProviderFamily::Local, format!("inference failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelSpec;

    fn request(path: &str) -> InvocationRequest {
        InvocationRequest {
            prompt: "x".to_string(),
            model: ModelSpec {
                logical_name: format!("local-{path}"),
                family: ProviderFamily::Local,
                wire_model_id: path.to_string(),
            },
            max_tokens: 8,
            temperature: 0.5,
            system_prompt: String::new(),
            stream: false,
        }
    }

    #[test]
    fn runtime_starts_unloaded() {
        let runtime = LocalRuntime::new();
        assert!(!runtime.is_loaded());
    }

    #[tokio::test]
    async fn missing_weights_fail_without_caching_a_model() {
        let runtime = LocalRuntime::new();
        let err = runtime
            .invoke(&request("/nonexistent/weights.gguf"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transport { .. }));
        // A failed load leaves the slot empty for the next attempt.
        assert!(!runtime.is_loaded());
    }

    #[tokio::test]
    async fn corrupt_weights_fail_during_load() {
        let dir = tempfile::tempdir().unwrap();
        let weights = dir.path().join("weights.gguf");
        std::fs::write(&weights, b"not a gguf file").unwrap();

        let runtime = LocalRuntime::new();
        let err = runtime
            .invoke(&request(weights.to_str().unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Transport { .. }));
        assert!(!runtime.is_loaded());
    }

    #[test]
    fn native_usage_keeps_runtime_field_names() {
        let usage = LocalUsage {
            prompt_tokens: 3,
            completion_tokens: 5,
            total_tokens: 8,
        };
        let value = serde_json::to_value(&usage).unwrap();
        assert_eq!(value["prompt_tokens"], 3);
        assert_eq!(value["completion_tokens"], 5);
        assert_eq!(value["total_tokens"], 8);
    }
}
