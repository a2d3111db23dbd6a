//! Tolerant extraction of logging fields from Messages API bodies.
//!
//! Nothing in here ever fails. Every field is decoded on its own and a field
//! with an unexpected shape simply falls back to its default, so a malformed
//! body degrades the log entry instead of the exchange.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Maximum number of characters kept in a prompt or response preview.
pub const PREVIEW_MAX_CHARS: usize = 500;

/// Logging fields taken from an inbound request body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSummary {
    pub model: String,
    pub prompt_preview: String,
}

/// Logging fields taken from an upstream response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSummary {
    pub response_preview: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Decode a field as `T`, or `None` if its JSON has any other shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessagesRequest {
    #[serde(deserialize_with = "lenient")]
    model: Option<String>,
    #[serde(deserialize_with = "lenient")]
    messages: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Message {
    #[serde(deserialize_with = "lenient")]
    content: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<Value>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentBlock {
    #[serde(rename = "type", deserialize_with = "lenient")]
    kind: Option<String>,
    #[serde(deserialize_with = "lenient")]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MessagesResponse {
    #[serde(deserialize_with = "lenient")]
    usage: Option<Usage>,
    #[serde(deserialize_with = "lenient")]
    content: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Usage {
    #[serde(deserialize_with = "lenient")]
    input_tokens: Option<u64>,
    #[serde(deserialize_with = "lenient")]
    output_tokens: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StreamEvent {
    #[serde(rename = "type", deserialize_with = "lenient")]
    kind: Option<String>,
    #[serde(deserialize_with = "lenient")]
    message: Option<MessagesResponse>,
    #[serde(deserialize_with = "lenient")]
    usage: Option<Usage>,
    #[serde(deserialize_with = "lenient")]
    delta: Option<ContentBlock>,
}

/// Parse `bytes` as a JSON object; arrays and scalars count as a shape failure.
fn parse_object<T: DeserializeOwned>(bytes: &[u8]) -> Option<T> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value @ Value::Object(_)) => T::deserialize(value).ok(),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Body is not JSON, logging fields left empty");
            None
        }
    }
}

/// Keep at most [`PREVIEW_MAX_CHARS`] characters.
pub fn truncate_preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_MAX_CHARS) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// Join the `text` of every `"text"` block with a single space.
///
/// Non-object entries are skipped; a text block without a string `text`
/// contributes an empty part.
fn join_text_blocks(blocks: &[Value]) -> String {
    blocks
        .iter()
        .filter_map(|block| ContentBlock::deserialize(block).ok())
        .filter(|block| block.kind.as_deref() == Some("text"))
        .map(|block| block.text.unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" ")
}

impl RequestSummary {
    /// Extract the model and a preview of the last message.
    ///
    /// ```
    /// use api_traffic_logger::core::summary::RequestSummary;
    ///
    /// let body = br#"{"model":"claude-3","messages":[{"role":"user","content":"hi"}]}"#;
    /// let summary = RequestSummary::from_body(body);
    /// assert_eq!(summary.model, "claude-3");
    /// assert_eq!(summary.prompt_preview, "hi");
    /// ```
    pub fn from_body(body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::default();
        }
        let Some(request) = parse_object::<MessagesRequest>(body) else {
            return Self::default();
        };

        let prompt_preview = request
            .messages
            .as_deref()
            .and_then(<[Value]>::last)
            .and_then(|last| Message::deserialize(last).ok())
            .and_then(|message| message.content)
            .map(|content| match content {
                MessageContent::Text(text) => truncate_preview(&text),
                MessageContent::Blocks(blocks) => truncate_preview(&join_text_blocks(&blocks)),
            })
            .unwrap_or_default();

        Self {
            model: request.model.unwrap_or_default(),
            prompt_preview,
        }
    }
}

impl ResponseSummary {
    /// Pick the decoder matching the upstream `Content-Type`.
    pub fn from_upstream(content_type: Option<&str>, body: &[u8]) -> Self {
        let is_event_stream = content_type
            .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/event-stream"))
            .unwrap_or(false);
        if is_event_stream {
            Self::from_event_stream(body)
        } else {
            Self::from_body(body)
        }
    }

    /// Decode a non-streaming Messages API response.
    ///
    /// A body that is not a JSON object is logged as raw text with zero token
    /// counts. An object without a `content` array keeps whatever `usage` it
    /// carries and uses the raw text as the preview.
    pub fn from_body(body: &[u8]) -> Self {
        let Some(response) = parse_object::<MessagesResponse>(body) else {
            return Self::raw_text(body);
        };

        let usage = response.usage.unwrap_or_default();
        let response_preview = match response.content {
            Some(blocks) => truncate_preview(&join_text_blocks(&blocks)),
            None => Self::raw_text(body).response_preview,
        };
        Self {
            response_preview,
            input_tokens: usage.input_tokens.unwrap_or(0),
            output_tokens: usage.output_tokens.unwrap_or(0),
        }
    }

    /// Decode a buffered server-sent-event stream.
    ///
    /// Input tokens come from `message_start`, output tokens from the last
    /// `message_delta`, and the preview from every `text_delta`.
    pub fn from_event_stream(body: &[u8]) -> Self {
        let Ok(text) = std::str::from_utf8(body) else {
            return Self::default();
        };

        let mut summary = Self::default();
        let mut preview = String::new();
        let mut recognised = false;

        for line in text.lines() {
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let Some(event) = parse_object::<StreamEvent>(data.trim().as_bytes()) else {
                continue;
            };

            match event.kind.as_deref() {
                Some("message_start") => {
                    recognised = true;
                    if let Some(usage) = event.message.and_then(|m| m.usage) {
                        summary.input_tokens = usage.input_tokens.unwrap_or(summary.input_tokens);
                        summary.output_tokens =
                            usage.output_tokens.unwrap_or(summary.output_tokens);
                    }
                }
                Some("message_delta") => {
                    recognised = true;
                    if let Some(usage) = event.usage {
                        summary.input_tokens = usage.input_tokens.unwrap_or(summary.input_tokens);
                        summary.output_tokens =
                            usage.output_tokens.unwrap_or(summary.output_tokens);
                    }
                }
                Some("content_block_delta") => {
                    recognised = true;
                    if let Some(delta) = event.delta {
                        if delta.kind.as_deref() == Some("text_delta") {
                            preview.push_str(delta.text.as_deref().unwrap_or_default());
                        }
                    }
                }
                _ => {}
            }

            // Only the first PREVIEW_MAX_CHARS characters are ever kept.
            if preview.len() > PREVIEW_MAX_CHARS * 4 {
                preview = truncate_preview(&preview);
            }
        }

        if !recognised {
            return Self::raw_text(body);
        }
        summary.response_preview = truncate_preview(&preview);
        summary
    }

    /// Raw body as the preview; undecodable bytes give an empty preview.
    fn raw_text(body: &[u8]) -> Self {
        let response_preview = std::str::from_utf8(body)
            .map(truncate_preview)
            .unwrap_or_default();
        Self {
            response_preview,
            ..Self::default()
        }
    }
}
