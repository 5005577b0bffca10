use aski_api::{AnthropicClient, OpenAiClient};
use aski_core::{DeltaStream, MessageNode, RequestParams, Summarizer, Transport, TransportError};
use serde::Deserialize;

use crate::config::{Config, load_api_key};
use crate::error::AskiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    /// Claude models go to Anthropic, everything else to OpenAI.
    pub fn infer(model: &str) -> Self {
        if model.starts_with("claude") {
            Provider::Anthropic
        } else {
            Provider::OpenAi
        }
    }

    pub fn key_env_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAi => write!(f, "openai"),
            Provider::Anthropic => write!(f, "anthropic"),
        }
    }
}

pub enum Client {
    OpenAi(OpenAiClient),
    Anthropic(AnthropicClient),
}

impl Client {
    /// Builds the client for `provider` from its key, base URL and summary model.
    pub fn from_config(config: &Config, provider: Provider, rest: bool) -> Result<Self, AskiError> {
        let api_key = load_api_key(config, provider)?;
        let base_url = config.base_url(provider);
        let client = match provider {
            Provider::OpenAi => {
                let mut client = OpenAiClient::with_base_url(api_key, base_url).streaming(!rest);
                if let Some(model) = &config.summary_model {
                    client = client.summary_model(model.as_str());
                }
                Client::OpenAi(client)
            }
            Provider::Anthropic => {
                let mut client =
                    AnthropicClient::with_base_url(api_key, base_url).streaming(!rest);
                if let Some(model) = &config.summary_model {
                    client = client.summary_model(model.as_str());
                }
                Client::Anthropic(client)
            }
        };
        Ok(client)
    }

    pub fn provider(&self) -> Provider {
        match self {
            Client::OpenAi(_) => Provider::OpenAi,
            Client::Anthropic(_) => Provider::Anthropic,
        }
    }
}

impl Transport for Client {
    async fn submit(
        &self,
        path: &[&MessageNode],
        params: &RequestParams,
    ) -> Result<DeltaStream, TransportError> {
        match self {
            Client::OpenAi(c) => c.submit(path, params).await,
            Client::Anthropic(c) => c.submit(path, params).await,
        }
    }
}

impl Summarizer for Client {
    async fn summarize(&self, path: &[&MessageNode]) -> Result<String, TransportError> {
        match self {
            Client::OpenAi(c) => c.summarize(path).await,
            Client::Anthropic(c) => c.summarize(path).await,
        }
    }
}
