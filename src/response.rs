//! Reshaping buffered upstream results for the endpoint that was called.
//!
//! Streaming results never come through here; see [`crate::sse`].
use crate::errors::RelayError;
use serde::Serialize;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Pulls `choices[0].message.content` out of an upstream completion.
fn assistant_content(completion: &Value) -> Result<&Value, RelayError> {
    completion
        .pointer("/choices/0/message/content")
        .ok_or_else(|| {
            RelayError::UpstreamProtocolError(
                "upstream response has no choices[0].message.content".into(),
            )
        })
}

/// The plain-text body of a legacy endpoint.
pub fn legacy_text(completion: &Value) -> Result<String, RelayError> {
    match assistant_content(completion)? {
        Value::String(text) => Ok(text.clone()),
        Value::Null => Ok(String::new()),
        other => Err(RelayError::UpstreamProtocolError(format!(
            "assistant content is not text: {other}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputText {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub role: &'static str,
    pub content: Vec<OutputText>,
}

/// The envelope returned by `POST /v1/responses` for buffered calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub id: String,
    pub object: &'static str,
    pub output: Vec<OutputMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

impl ResponseEnvelope {
    /// Wraps a chat completion as a single assistant message.
    pub fn from_completion(completion: &Value) -> Result<Self, RelayError> {
        Self::with_token(completion, &response_token())
    }

    fn with_token(completion: &Value, token: &str) -> Result<Self, RelayError> {
        let text = assistant_content(completion)?.clone();
        Ok(Self {
            id: format!("resp_{token}"),
            object: "response",
            output: vec![OutputMessage {
                id: format!("msg_{token}"),
                kind: "message",
                role: "assistant",
                content: vec![OutputText {
                    kind: "output_text",
                    text,
                }],
            }],
            usage: completion.get("usage").cloned(),
        })
    }
}

/// Wall-clock milliseconds; unique enough to tell one response from the next.
fn response_token() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}
