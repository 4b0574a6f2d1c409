//! Error taxonomy for the relay and its mapping onto OpenAI-style error bodies.
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A model was supplied that is not in the registry.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Lookup of a single model by id missed.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("'messages' is required")]
    MissingMessages,

    /// The inbound body could not be read as a JSON object.
    #[error("{0}")]
    InvalidBody(String),

    /// Connection refused, DNS failure, reset... anything below HTTP.
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// The upstream answered but the buffered body was not what we needed.
    #[error("upstream protocol error: {0}")]
    UpstreamProtocolError(String),

    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidModel(_)
            | RelayError::MissingMessages
            | RelayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            RelayError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            RelayError::UpstreamUnreachable(_) | RelayError::UpstreamProtocolError(_) => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            RelayError::InvalidModel(_)
            | RelayError::MissingMessages
            | RelayError::InvalidBody(_) => "invalid_request_error",
            RelayError::ModelNotFound(_) => "not_found_error",
            RelayError::UpstreamUnreachable(_)
            | RelayError::UpstreamProtocolError(_)
            | RelayError::UpstreamTimeout(_) => "upstream_error",
            RelayError::Internal(_) => "server_error",
        }
    }

    /// The message clients see. Registry misses use the fixed OpenAI-style
    /// wording; everything else uses the display string.
    fn public_message(&self) -> String {
        match self {
            RelayError::InvalidModel(_) => "Invalid model".to_string(),
            RelayError::ModelNotFound(_) => "Model not found".to_string(),
            other => other.to_string(),
        }
    }

    /// Legacy routes answer in plain text: 403 for an unknown model, 503 with
    /// the error string for anything that went wrong talking to the upstream.
    pub fn into_legacy_response(self) -> Response {
        match self {
            RelayError::InvalidModel(_) => {
                (StatusCode::FORBIDDEN, "Invalid Model").into_response()
            }
            other => (StatusCode::SERVICE_UNAVAILABLE, other.to_string()).into_response(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "message": self.public_message(),
                "type": self.error_type()
            }
        });
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for RelayError {
    fn from(rejection: JsonRejection) -> Self {
        RelayError::InvalidBody(format!("Invalid JSON: {}", rejection.body_text()))
    }
}
