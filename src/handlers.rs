/// Axum handlers for the relay
use crate::client::HttpClient;
use crate::errors::RelayError;
use crate::models::{ListModelResponse, Model};
use crate::response::{self, ResponseEnvelope};
use crate::translate::{self, UpstreamRequest};
use crate::upstream::UpstreamResult;
use crate::{AppState, sse};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

const WELCOME: &str = "Welcome to IntAPI!
Now supports OpenAI-compatible API at /v1

Endpoints:
- GET  /v1/models
- GET  /v1/models/:id
- POST /v1/chat/completions
- POST /v1/responses

Legacy:
- /model/:id/:q
- /model/:q
";

pub async fn root() -> &'static str {
    WELCOME
}

#[instrument]
pub async fn list_models() -> impl IntoResponse {
    Json(ListModelResponse::from_registry())
}

#[instrument]
pub async fn get_model(Path(id): Path<String>) -> Result<Json<Model>, RelayError> {
    Model::lookup(&id)
        .map(Json)
        .ok_or(RelayError::ModelNotFound(id))
}

/// `POST /v1/chat/completions`: validated, then passed through untouched.
#[instrument(skip(state, body))]
pub async fn chat_completions<T: HttpClient>(
    State(state): State<AppState<T>>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Response, RelayError> {
    let request = translate::chat_completions(json_object(body)?)?;
    info!(model = %request.model, stream = request.stream, "Chat completions request");

    match state.upstream.invoke(&state.http_client, &request).await? {
        UpstreamResult::Stream(upstream) => Ok(sse::event_stream_response(upstream)),
        UpstreamResult::Buffered { status, body } => Ok((status, Json(body)).into_response()),
    }
}

/// `POST /v1/responses`: translated to a chat completion, answered as a response envelope.
#[instrument(skip(state, body))]
pub async fn responses<T: HttpClient>(
    State(state): State<AppState<T>>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Response, RelayError> {
    let request = translate::responses(json_object(body)?, state.validate_responses_model)?;
    info!(model = %request.model, stream = request.stream, "Responses request");

    match state.upstream.invoke(&state.http_client, &request).await? {
        UpstreamResult::Stream(upstream) => Ok(sse::event_stream_response(upstream)),
        // Upstream errors carry no choices to wrap; hand them back as they are.
        UpstreamResult::Buffered { status, body } if !status.is_success() => {
            warn!(%status, "Upstream rejected responses request");
            Ok((status, Json(body)).into_response())
        }
        UpstreamResult::Buffered { body, .. } => {
            Ok(Json(ResponseEnvelope::from_completion(&body)?).into_response())
        }
    }
}

/// A body sent without a JSON content type is read as an empty object rather than rejected.
fn json_object(
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Map<String, Value>, RelayError> {
    match body {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => {
            debug!("Body without a JSON content type, treating it as empty");
            Ok(Map::new())
        }
        Err(rejection) => Err(rejection.into()),
    }
}

/// `GET /model/{id}/{q}`
#[instrument(skip(state))]
pub async fn legacy_with_model<T: HttpClient>(
    State(state): State<AppState<T>>,
    Path((id, question)): Path<(String, String)>,
) -> Response {
    match translate::legacy_with_model(&id, &question) {
        Ok(request) => legacy_answer(&state, request).await,
        Err(e) => e.into_legacy_response(),
    }
}

/// `GET /model/{q}`
#[instrument(skip(state))]
pub async fn legacy_default<T: HttpClient>(
    State(state): State<AppState<T>>,
    Path(question): Path<String>,
) -> Response {
    legacy_answer(&state, translate::legacy_default(&question)).await
}

async fn legacy_answer<T: HttpClient>(state: &AppState<T>, request: UpstreamRequest) -> Response {
    info!(model = %request.model, "Legacy question");
    let answer = match state.upstream.invoke(&state.http_client, &request).await {
        Ok(UpstreamResult::Buffered { body, .. }) => response::legacy_text(&body),
        Ok(UpstreamResult::Stream(_)) => Err(RelayError::Internal(
            "legacy requests are never streamed".into(),
        )),
        Err(e) => Err(e),
    };

    match answer {
        Ok(text) => text.into_response(),
        Err(e) => {
            warn!(error = %e, "Legacy request failed");
            e.into_legacy_response()
        }
    }
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "ERROR 404: Not Found.")
}
