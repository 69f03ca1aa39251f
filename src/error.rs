//! Dispatch error taxonomy.
//!
//! Every provider-level failure is logged with its diagnostic context at the
//! site that observed it and then propagated through these variants. There is
//! no retry and no silent fallback to another provider.

use crate::models::ProviderFamily;

/// Errors surfaced by the dispatch facade and the transports underneath it.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The logical name matched no provider table and no prefix convention.
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// A local model name whose remainder after prefix stripping is empty.
    #[error("invalid local model path in '{0}'")]
    InvalidLocalModelPath(String),

    /// Network/auth/quota failure surfaced verbatim from a provider client.
    /// `code` carries the provider's error code when one was available.
    #[error("{provider} transport error: {message}")]
    Transport {
        provider: ProviderFamily,
        code: Option<String>,
        message: String,
    },

    /// The provider answered, but with a shape the transport does not
    /// recognize (missing field, wrong type, undecodable chunk).
    #[error("{provider} protocol error: {detail}")]
    Protocol {
        provider: ProviderFamily,
        detail: String,
    },
}

impl DispatchError {
    /// Build a transport error without a provider error code.
    pub fn transport(provider: ProviderFamily, message: impl Into<String>) -> Self {
        DispatchError::Transport {
            provider,
            code: None,
            message: message.into(),
        }
    }

    /// Build a protocol error for an unexpected response shape.
    pub fn protocol(provider: ProviderFamily, detail: impl Into<String>) -> Self {
        DispatchError::Protocol {
            provider,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_provider_and_message() {
        let err = DispatchError::Transport {
            provider: ProviderFamily::Bedrock,
            code: Some("ThrottlingException".to_string()),
            message: "rate exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "bedrock transport error: rate exceeded");

        let err = DispatchError::protocol(ProviderFamily::OpenAi, "no choices in response");
        assert_eq!(
            err.to_string(),
            "openai protocol error: no choices in response"
        );
    }

    #[test]
    fn unsupported_model_names_the_offender() {
        let err = DispatchError::UnsupportedModel("gpt-5".to_string());
        assert_eq!(err.to_string(), "unsupported model: gpt-5");
    }
}
