//! Model Router
//!
//! Maps a caller-facing logical model name to a provider family and the
//! identifier that goes on the wire. Family detection runs before any table
//! lookup: `bedrock-` and `anthropic-` prefixed names route by alias table,
//! an exact-match allowlist routes to OpenAI, and `local-<path>` names carry
//! their weights path in the name itself.
//!
//! The alias tables are closed. A name that matches a family rule but not
//! its table is a programming error and panics; a name matching no rule at
//! all fails with [`DispatchError::UnsupportedModel`].

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::DispatchError;
use crate::models::{ModelSpec, ProviderFamily};

const BEDROCK_PREFIX: &str = "bedrock-";
const ANTHROPIC_PREFIX: &str = "anthropic-";
const LOCAL_PREFIX: &str = "local";

/// Logical names served directly by the OpenAI chat completions API.
const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-3.5-turbo"];

static BEDROCK_MODELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("bedrock-haiku", "anthropic.claude-3-haiku-20240307-v1:0"),
        ("bedrock-sonnet", "anthropic.claude-3-sonnet-20240229-v1:0"),
        ("bedrock-opus", "anthropic.claude-3-opus-20240229-v1:0"),
        ("bedrock-sonnet3.5", "anthropic.claude-3-5-sonnet-20240620-v1:0"),
    ])
});

static ANTHROPIC_MODELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("anthropic-haiku", "claude-3-haiku-20240307"),
        ("anthropic-sonnet", "claude-3-sonnet-20240229"),
        ("anthropic-opus", "claude-3-opus-20240229"),
        ("anthropic-sonnet3.5", "claude-3-5-sonnet-20240620"),
    ])
});

/// Resolve a logical model name to its [`ModelSpec`].
///
/// Detection order mirrors dispatch: gateway prefix, OpenAI allowlist,
/// Anthropic prefix, local prefix.
pub fn resolve(logical_name: &str) -> Result<ModelSpec, DispatchError> {
    if logical_name.starts_with(BEDROCK_PREFIX) {
        let wire = BEDROCK_MODELS
            .get(logical_name)
            .unwrap_or_else(|| panic!("no gateway model mapping for '{logical_name}'"));
        return Ok(spec(logical_name, ProviderFamily::Bedrock, wire));
    }

    if OPENAI_MODELS.contains(&logical_name) {
        // Wire id is the logical name itself.
        return Ok(spec(logical_name, ProviderFamily::OpenAi, logical_name));
    }

    if logical_name.starts_with(ANTHROPIC_PREFIX) {
        let wire = ANTHROPIC_MODELS
            .get(logical_name)
            .unwrap_or_else(|| panic!("no anthropic model mapping for '{logical_name}'"));
        return Ok(spec(logical_name, ProviderFamily::Anthropic, wire));
    }

    if let Some(rest) = logical_name.strip_prefix(LOCAL_PREFIX) {
        let path = rest.strip_prefix('-').unwrap_or_default();
        if path.is_empty() {
            return Err(DispatchError::InvalidLocalModelPath(
                logical_name.to_string(),
            ));
        }
        return Ok(spec(logical_name, ProviderFamily::Local, path));
    }

    Err(DispatchError::UnsupportedModel(logical_name.to_string()))
}

fn spec(logical_name: &str, family: ProviderFamily, wire_model_id: &str) -> ModelSpec {
    ModelSpec {
        logical_name: logical_name.to_string(),
        family,
        wire_model_id: wire_model_id.to_string(),
    }
}
