use aski_core::TransportError;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("response has no content")]
    EmptyResponse,
}

impl ApiError {
    /// Builds an API error from a non-success response body.
    ///
    /// Both providers wrap the reason as `{"error": {"message": ...}}`.
    pub(crate) fn from_body(status: u16, body: String) -> Self {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .unwrap_or_else(|| {
                if body.is_empty() {
                    "Unknown error".to_string()
                } else {
                    body
                }
            });
        ApiError::Api { status, message }
    }
}

impl From<ApiError> for TransportError {
    fn from(e: ApiError) -> Self {
        TransportError::new(e)
    }
}
