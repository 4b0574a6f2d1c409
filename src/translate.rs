//! Request translation
//!
//! Every inbound endpoint shape (legacy path parameters, chat completions, responses) is reduced
//! to a single [`UpstreamRequest`], which serializes to the upstream's chat-completions body.
//! Fields the relay does not understand are carried through untouched, in the order they arrived.
use crate::errors::RelayError;
use crate::models;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// A single chat message synthesized by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// The `messages` field of an upstream request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Messages {
    /// Built by the relay from a bare question or input string.
    Synthesized(Vec<ChatMessage>),
    /// Supplied by the caller; forwarded without looking inside.
    Verbatim(Value),
}

impl Messages {
    fn single_user(content: impl Into<String>) -> Self {
        Messages::Synthesized(vec![ChatMessage::user(content)])
    }
}

/// The canonical body POSTed to the upstream chat-completions endpoint.
///
/// Serializes as `model, messages, stream` followed by every pass-through field. `model` is
/// kept as JSON because unvalidated paths forward whatever the caller sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamRequest {
    pub model: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Messages>,
    pub stream: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UpstreamRequest {
    fn question(model: &str, question: &str) -> Self {
        Self {
            model: Value::String(model.to_owned()),
            messages: Some(Messages::single_user(question)),
            stream: false,
            extra: Map::new(),
        }
    }
}

/// `/model/{id}/{q}`: the id has to be a registered model.
pub fn legacy_with_model(id: &str, question: &str) -> Result<UpstreamRequest, RelayError> {
    if !models::is_known(id) {
        return Err(RelayError::InvalidModel(id.to_owned()));
    }
    Ok(UpstreamRequest::question(id, question))
}

/// `/model/{q}`: always the default model.
pub fn legacy_default(question: &str) -> UpstreamRequest {
    UpstreamRequest::question(models::default_model(), question)
}

/// `POST /v1/chat/completions`.
pub fn chat_completions(mut body: Map<String, Value>) -> Result<UpstreamRequest, RelayError> {
    let model = resolve_model(body.shift_remove("model"), true)?;
    let messages = take_present(&mut body, "messages").ok_or(RelayError::MissingMessages)?;
    let stream = truthy(take_present(&mut body, "stream"));

    debug!(
        model = %model,
        stream,
        extra_fields = body.len(),
        "Translated chat completions request"
    );

    Ok(UpstreamRequest {
        model,
        messages: Some(Messages::Verbatim(messages)),
        stream,
        extra: body,
    })
}

/// `POST /v1/responses`.
///
/// Messages resolve as: explicit `messages`, else a string `input` wrapped as one user message,
/// else `input` itself. `input` is never forwarded as its own field. Model validation only
/// happens when `validate_model` is set.
pub fn responses(
    mut body: Map<String, Value>,
    validate_model: bool,
) -> Result<UpstreamRequest, RelayError> {
    let model = resolve_model(body.shift_remove("model"), validate_model)?;
    let input = take_present(&mut body, "input");
    let messages = take_present(&mut body, "messages");
    let stream = truthy(take_present(&mut body, "stream"));

    let messages = match (messages, input) {
        (Some(messages), _) => Some(Messages::Verbatim(messages)),
        (None, Some(Value::String(text))) => Some(Messages::single_user(text)),
        (None, Some(structured)) => Some(Messages::Verbatim(structured)),
        (None, None) => None,
    };

    debug!(
        model = %model,
        stream,
        has_messages = messages.is_some(),
        extra_fields = body.len(),
        "Translated responses request"
    );

    Ok(UpstreamRequest {
        model,
        messages,
        stream,
        extra: body,
    })
}

/// Removes `key`, treating an explicit `null` the same as absence.
fn take_present(body: &mut Map<String, Value>, key: &str) -> Option<Value> {
    body.shift_remove(key).filter(|v| !v.is_null())
}

/// Only an absent `model` falls back to the default. An explicit `null` or any other non-string
/// is forwarded as-is when not validating, and is never a registered id when validating.
fn resolve_model(model: Option<Value>, validate: bool) -> Result<Value, RelayError> {
    match model {
        None => Ok(Value::String(models::default_model().to_owned())),
        Some(Value::String(id)) if validate && !models::is_known(&id) => {
            Err(RelayError::InvalidModel(id))
        }
        Some(Value::String(id)) => Ok(Value::String(id)),
        Some(other) if validate => Err(RelayError::InvalidModel(other.to_string())),
        Some(other) => Ok(other),
    }
}

/// Loose truthiness for the `stream` flag, so `"stream": 1` streams as it always has.
fn truthy(value: Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
