use aski_core::{MessageNode, RequestParams, Role};
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::sse::SseEvent;
use crate::summary::{SUMMARY_INSTRUCTION, transcript};

/// Reply budget used when the profile sets none; the API requires one.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Builds the JSON body for a Messages API request.
///
/// System turns are lifted into the top-level `system` field, joined by a
/// blank line. The remaining turns keep their path order.
pub fn build_request_body(path: &[&MessageNode], params: &RequestParams, stream: bool) -> Value {
    let system: Vec<&str> = path
        .iter()
        .filter(|n| n.role() == Role::System)
        .map(|n| n.content())
        .collect();
    let messages: Vec<Value> = path
        .iter()
        .filter(|n| n.role() != Role::System)
        .map(|n| json!({ "role": n.role().as_str(), "content": n.content() }))
        .collect();

    let mut body = json!({
        "model": params.model,
        "messages": messages,
        "max_tokens": params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    });
    if !system.is_empty() {
        body["system"] = json!(system.join("\n\n"));
    }
    if let Some(temp) = params.temperature {
        body["temperature"] = json!(temp);
    }
    if let Some(top_p) = params.top_p {
        body["top_p"] = json!(top_p);
    }
    if let Some(stop) = &params.stop {
        body["stop_sequences"] = json!(stop);
    }
    if stream {
        body["stream"] = json!(true);
    }

    body
}

/// Concatenates the text blocks of a non-streaming response.
pub fn parse_response(response: &Value) -> Result<String, ApiError> {
    let blocks = response
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or(ApiError::EmptyResponse)?;

    Ok(blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect())
}

/// Maps a streamed Messages API event to an event.
///
/// Only `text_delta` blocks carry reply text; pings and bookkeeping events
/// yield nothing.
pub fn map_event(value: &Value) -> Option<SseEvent> {
    match value.get("type")?.as_str()? {
        "content_block_delta" => {
            let delta = value.get("delta")?;
            if delta.get("type")?.as_str()? != "text_delta" {
                return None;
            }
            let text = delta.get("text")?.as_str()?;
            (!text.is_empty()).then(|| SseEvent::Delta(text.to_string()))
        }
        "message_stop" => Some(SseEvent::Done),
        "error" => {
            let message = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            Some(SseEvent::Error(message.to_string()))
        }
        _ => None,
    }
}

/// Builds a title request: the transcript followed by the instruction.
pub fn summary_body(path: &[&MessageNode], model: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": DEFAULT_MAX_TOKENS,
        "messages": [{
            "role": "user",
            "content": format!("{}\n\n{}", transcript(path), SUMMARY_INSTRUCTION),
        }]
    })
}
