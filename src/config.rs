//! Environment-backed configuration.
//!
//! Three independent credential sets feed the transports:
//! - the AWS triple (region + access key + secret, optional session token),
//! - `OPENAI_API_KEY`,
//! - `ANTHROPIC_API_KEY`.
//!
//! Absence of the AWS set disables the owned gateway client (logged, never
//! fatal); the API keys are read lazily and not validated until first use.

/// AWS configuration for the Bedrock gateway transport.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

/// Region used when the caller never configured one and a gateway call still
/// has to go out (call-time fallback client).
pub const FALLBACK_REGION: &str = "us-west-2";

impl GatewayConfig {
    /// Load the AWS triple from environment variables.
    pub fn from_env() -> Self {
        Self {
            region: std::env::var("AWS_REGION")
                .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id: non_empty_env("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty_env("AWS_SECRET_ACCESS_KEY"),
            session_token: non_empty_env("AWS_SESSION_TOKEN"),
        }
    }

    /// Whether enough of the triple is present to construct an owned client.
    pub fn has_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

/// OpenAI API key; empty until first use is fine.
pub fn openai_api_key() -> String {
    std::env::var("OPENAI_API_KEY").unwrap_or_default()
}

/// Anthropic API key; empty until first use is fine.
pub fn anthropic_api_key() -> String {
    std::env::var("ANTHROPIC_API_KEY").unwrap_or_default()
}

/// OpenAI endpoint base, overridable for self-hosted compatible upstreams
/// and for tests.
pub fn openai_base_url() -> String {
    match std::env::var("OPENAI_BASE_URL") {
        Ok(val) if !val.trim().is_empty() => val,
        _ => "https://api.openai.com/v1".to_string(),
    }
}

/// Anthropic endpoint base, overridable the same way.
pub fn anthropic_base_url() -> String {
    match std::env::var("ANTHROPIC_BASE_URL") {
        Ok(val) if !val.trim().is_empty() => val,
        _ => "https://api.anthropic.com/v1".to_string(),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
