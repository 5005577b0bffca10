use aski_core::{MessageNode, RequestParams};
use serde_json::{Value, json};

use crate::error::ApiError;
use crate::sse::SseEvent;
use crate::summary::{SUMMARY_INSTRUCTION, transcript};

fn message_to_json(node: &MessageNode) -> Value {
    json!({
        "role": node.role().as_str(),
        "content": node.content()
    })
}

/// Builds the JSON body for a chat completions request.
///
/// `path` is sent oldest first, exactly as the active path orders it.
pub fn build_request_body(path: &[&MessageNode], params: &RequestParams, stream: bool) -> Value {
    let messages: Vec<Value> = path.iter().map(|n| message_to_json(n)).collect();

    let mut body = json!({
        "model": params.model,
        "messages": messages
    });
    apply_params(&mut body, params);

    if stream {
        body["stream"] = json!(true);
    }

    body
}

fn apply_params(body: &mut Value, params: &RequestParams) {
    if let Some(temp) = params.temperature {
        body["temperature"] = json!(temp);
    }
    if let Some(top_p) = params.top_p {
        body["top_p"] = json!(top_p);
    }
    if let Some(max_tokens) = params.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(stop) = &params.stop {
        body["stop"] = json!(stop);
    }
    if let Some(pres_pen) = params.presence_penalty {
        body["presence_penalty"] = json!(pres_pen);
    }
    if let Some(freq_pen) = params.frequency_penalty {
        body["frequency_penalty"] = json!(freq_pen);
    }
    if let Some(bias) = &params.logit_bias {
        body["logit_bias"] = json!(bias);
    }
    if params.json_mode {
        body["response_format"] = json!({ "type": "json_object" });
    }
}

/// Extracts the assistant text from a non-streaming response.
pub fn parse_response(response: &Value) -> Result<String, ApiError> {
    let message = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or(ApiError::EmptyResponse)?;

    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}

/// Maps a streamed `chat.completion.chunk` to an event.
pub fn map_chunk(value: &Value) -> Option<SseEvent> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error");
        return Some(SseEvent::Error(message.to_string()));
    }

    let delta = value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()?;
    if delta.is_empty() {
        None
    } else {
        Some(SseEvent::Delta(delta.to_string()))
    }
}

/// Builds a title request: the transcript and the instruction as two user turns.
pub fn summary_body(path: &[&MessageNode], model: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "user", "content": transcript(path) },
            { "role": "user", "content": SUMMARY_INSTRUCTION },
        ]
    })
}
