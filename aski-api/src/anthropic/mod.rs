//! Anthropic Messages API.

mod convert;

use aski_core::{DeltaStream, MessageNode, RequestParams, Summarizer, Transport, TransportError};
use futures::{StreamExt, stream};
use serde_json::Value;
use tracing::{debug, instrument};

pub use convert::{DEFAULT_MAX_TOKENS, build_request_body, map_event, parse_response, summary_body};

use crate::error::ApiError;
use crate::sse::delta_stream;
use crate::summary::clean_title;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const API_VERSION: &str = "2023-06-01";
pub const DEFAULT_SUMMARY_MODEL: &str = "claude-3-5-haiku-latest";

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    streaming: bool,
    summary_model: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            streaming: true,
            summary_model: DEFAULT_SUMMARY_MODEL.to_string(),
        }
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn summary_model(mut self, model: impl Into<String>) -> Self {
        self.summary_model = model.into();
        self
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, ApiError> {
        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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

    #[instrument(skip(self, path, params), fields(model = %params.model, turns = path.len()))]
    pub async fn complete(
        &self,
        path: &[&MessageNode],
        params: &RequestParams,
    ) -> Result<String, ApiError> {
        let body = build_request_body(path, params, false);
        debug!("sending messages request");

        let response: Value = self.post(&body).await?.json().await?;
        parse_response(&response)
    }

    #[instrument(skip(self, path, params), fields(model = %params.model, turns = path.len()))]
    pub async fn stream(
        &self,
        path: &[&MessageNode],
        params: &RequestParams,
    ) -> Result<DeltaStream, ApiError> {
        let body = build_request_body(path, params, true);
        debug!("opening messages stream");

        let response = self.post(&body).await?;
        Ok(delta_stream(response.bytes_stream(), map_event))
    }

    #[instrument(skip(self, path), fields(model = %self.summary_model))]
    pub async fn title(&self, path: &[&MessageNode]) -> Result<String, ApiError> {
        let body = summary_body(path, &self.summary_model);
        let response: Value = self.post(&body).await?.json().await?;
        Ok(clean_title(&parse_response(&response)?))
    }
}

impl Transport for AnthropicClient {
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

impl Summarizer for AnthropicClient {
    async fn summarize(&self, path: &[&MessageNode]) -> Result<String, TransportError> {
        Ok(self.title(path).await?)
    }
}
