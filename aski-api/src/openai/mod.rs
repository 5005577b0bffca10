//! OpenAI chat completions.

mod convert;

use aski_core::{
    DEFAULT_MODEL, DeltaStream, MessageNode, RequestParams, Summarizer, Transport, TransportError,
};
use futures::{StreamExt, stream};
use serde_json::Value;
use tracing::{debug, instrument};

pub use convert::{build_request_body, map_chunk, parse_response, summary_body};

use crate::error::ApiError;
use crate::sse::delta_stream;
use crate::summary::clean_title;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for OpenAI-compatible chat completion APIs.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    streaming: bool,
    summary_model: String,
}

impl OpenAiClient {
    /// Creates a streaming client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Creates a streaming client with a custom base URL.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            streaming: true,
            summary_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Chooses between SSE streaming and a single blocking response.
    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Sets the model used to title conversations.
    pub fn summary_model(mut self, model: impl Into<String>) -> Self {
        self.summary_model = model.into();
        self
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, ApiError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(ApiError::from_body(status.as_u16(), text))
    }

    /// Executes a completion request and returns the whole reply.
    #[instrument(skip(self, path, params), fields(model = %params.model, turns = path.len()))]
    pub async fn complete(
        &self,
        path: &[&MessageNode],
        params: &RequestParams,
    ) -> Result<String, ApiError> {
        let body = build_request_body(path, params, false);
        debug!("sending completion request");

        let response: Value = self.post(&body).await?.json().await?;
        debug!("received completion response");

        parse_response(&response)
    }

    /// Opens a streaming completion and returns its text deltas.
    #[instrument(skip(self, path, params), fields(model = %params.model, turns = path.len()))]
    pub async fn stream(
        &self,
        path: &[&MessageNode],
        params: &RequestParams,
    ) -> Result<DeltaStream, ApiError> {
        let body = build_request_body(path, params, true);
        debug!("opening completion stream");

        let response = self.post(&body).await?;
        Ok(delta_stream(response.bytes_stream(), map_chunk))
    }

    /// Asks for a one-line title of the conversation.
    #[instrument(skip(self, path), fields(model = %self.summary_model))]
    pub async fn title(&self, path: &[&MessageNode]) -> Result<String, ApiError> {
        let body = summary_body(path, &self.summary_model);
        let response: Value = self.post(&body).await?.json().await?;
        Ok(clean_title(&parse_response(&response)?))
    }
}

impl Transport for OpenAiClient {
    async fn submit(
        &self,
        path: &[&MessageNode],
        params: &RequestParams,
    ) -> Result<DeltaStream, TransportError> {
        if self.streaming {
            return Ok(self.stream(path, params).await?);
        }
        let reply = self.complete(path, params).await?;
        Ok(stream::iter([Ok(reply)]).boxed())
    }
}

impl Summarizer for OpenAiClient {
    async fn summarize(&self, path: &[&MessageNode]) -> Result<String, TransportError> {
        Ok(self.title(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aski_core::Role;

    #[test]
    fn client_creation() {
        let client = OpenAiClient::new("test-key");
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert!(client.streaming);
        assert_eq!(client.summary_model, DEFAULT_MODEL);
    }

    #[test]
    fn client_custom_base_url() {
        let client = OpenAiClient::with_base_url("test-key", "http://localhost:8080/v1/")
            .streaming(false)
            .summary_model("local");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert!(!client.streaming);
        assert_eq!(client.summary_model, "local");
    }

    #[tokio::test]
    #[ignore = "requires OPENAI_API_KEY env var"]
    async fn live_api() {
        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let client = OpenAiClient::new(api_key);

        let node = MessageNode::new(Role::User, "Say 'hello' and nothing else.", None);
        let deltas = client
            .submit(&[&node], &RequestParams::default())
            .await
            .unwrap();
        let reply: Vec<String> = deltas.map(|d| d.unwrap()).collect().await;
        assert!(!reply.concat().is_empty());
    }
}
