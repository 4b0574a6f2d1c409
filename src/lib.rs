//! IntAPI - a small OpenAI-compatible relay
//!
//! Every request is forwarded to a single chat-completions upstream. Three inbound shapes are
//! accepted: the legacy path-parameter question routes, OpenAI chat completions, and OpenAI
//! responses. Each is translated into one upstream request and the reply is reshaped for the
//! caller (or relayed byte for byte when streaming).

use axum::Router;
use axum::routing::{get, post};
use axum_prometheus::{
    GenericMetricLayer, Handle, PrometheusMetricLayerBuilder,
    metrics_exporter_prometheus::PrometheusHandle,
};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, instrument};

pub mod client;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod response;
pub mod sse;
pub mod translate;
pub mod upstream;

use client::{HttpClient, HyperClient, PoolConfig};
use upstream::Upstream;

/// The main application state: the HTTP client and where (and how) to reach the upstream.
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub upstream: Arc<Upstream>,
    /// Apply registry validation to `model` on `/v1/responses` as well. Off by default: that
    /// endpoint has historically forwarded any model name.
    pub validate_responses_model: bool,
}

impl AppState<HyperClient> {
    /// Create a new AppState with the default Hyper client
    pub fn new(upstream: Upstream) -> Self {
        Self::with_client(upstream, client::create_hyper_client(PoolConfig::default()))
    }
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with a custom HTTP client (useful for testing)
    pub fn with_client(upstream: Upstream, http_client: T) -> Self {
        Self {
            http_client,
            upstream: Arc::new(upstream),
            validate_responses_model: false,
        }
    }

    pub fn validate_responses_model(mut self, validate: bool) -> Self {
        self.validate_responses_model = validate;
        self
    }
}

/// Build the main router for the relay
/// This creates routes for:
/// - `/` - Plain-text welcome
/// - `/v1/models`, `/v1/models/{id}` - The model registry
/// - `/v1/chat/completions`, `/v1/responses` - OpenAI-compatible endpoints
/// - `/model/{id}/{q}`, `/model/{q}` - Legacy question endpoints
///
/// Anything else, including a known path with the wrong method, is a plain-text 404.
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    Router::new()
        .route("/", get(handlers::root))
        .route("/v1/models", get(handlers::list_models))
        .route("/v1/models/{id}", get(handlers::get_model))
        .route("/v1/chat/completions", post(handlers::chat_completions::<T>))
        .route("/v1/responses", post(handlers::responses::<T>))
        .route("/model/{id}/{q}", get(handlers::legacy_with_model::<T>))
        .route("/model/{q}", get(handlers::legacy_default::<T>))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .with_state(state)
}

/// Builds a router for the metrics endpoint.
#[instrument(skip(handle))]
pub fn build_metrics_router(handle: PrometheusHandle) -> Router {
    info!("Building metrics router");
    Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

type MetricsLayerAndHandle = (
    GenericMetricLayer<'static, PrometheusHandle, Handle>,
    PrometheusHandle,
);

/// Endpoint label for requests that matched no route.
const UNMATCHED_ENDPOINT: &str = "unmatched";

fn unmatched_endpoint(_path: &str) -> String {
    UNMATCHED_ENDPOINT.to_string()
}

/// Builds a layer and handle for prometheus metrics collection.
///
/// `prefix` must be `'static` (or owned) because the Prometheus layer keeps it for the life of
/// the process. Endpoints are labelled by route template, never by the raw path, since legacy
/// paths carry the user's question.
pub fn build_metrics_layer_and_handle(
    prefix: impl Into<Cow<'static, str>>,
) -> MetricsLayerAndHandle {
    info!("Building metrics layer");
    PrometheusMetricLayerBuilder::new()
        .with_prefix(prefix)
        .enable_response_body_size(true)
        .with_endpoint_label_type(axum_prometheus::EndpointLabel::MatchedPathWithFallbackFn(
            unmatched_endpoint,
        ))
        .with_default_metrics()
        .build_pair()
}
