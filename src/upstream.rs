//! The upstream invoker: one POST to `<base>/chat/completions` per inbound request.
use crate::client::HttpClient;
use crate::errors::RelayError;
use crate::translate::UpstreamRequest;
use anyhow::{Context as _, ensure};
use axum::{
    body::Body,
    http::{HeaderValue, Method, Request, StatusCode, Uri, header},
    response::Response,
};
use bon::bon;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// What came back from the upstream.
#[derive(Debug)]
pub enum UpstreamResult {
    /// The full body, parsed as JSON. Its shape is not checked here.
    Buffered { status: StatusCode, body: Value },
    /// The live upstream response, body still unread.
    Stream(Response),
}

/// The single upstream this relay talks to.
#[derive(Debug, Clone)]
pub struct Upstream {
    completions_uri: Uri,
    authorization: HeaderValue,
    timeout: Option<Duration>,
}

#[bon]
impl Upstream {
    #[builder]
    pub fn new(
        base_url: Url,
        #[builder(into)] api_key: String,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        ensure!(
            matches!(base_url.scheme(), "http" | "https"),
            "Upstream URL '{}' must use http or https",
            base_url
        );

        let completions = format!(
            "{}/chat/completions",
            base_url.as_str().trim_end_matches('/')
        );
        let completions_uri = Uri::try_from(completions.as_str())
            .with_context(|| format!("Invalid upstream URL '{completions}'"))?;

        let mut authorization = HeaderValue::try_from(format!("Bearer {api_key}"))
            .context("Upstream API key is not a valid header value")?;
        authorization.set_sensitive(true);

        Ok(Self {
            completions_uri,
            authorization,
            timeout,
        })
    }
}

impl Upstream {
    pub fn completions_uri(&self) -> &Uri {
        &self.completions_uri
    }

    /// Send `request` upstream.
    ///
    /// Streaming requests hand back the response as soon as headers arrive; everything else is
    /// buffered and parsed. There are no retries. The optional timeout covers the wait for
    /// headers, plus the body read when buffering.
    #[instrument(skip_all, fields(model = %request.model, stream = request.stream))]
    pub async fn invoke<T: HttpClient>(
        &self,
        client: &T,
        request: &UpstreamRequest,
    ) -> Result<UpstreamResult, RelayError> {
        let call = self.call(client, request);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                warn!("Upstream call exceeded {:?}", limit);
                RelayError::UpstreamTimeout(limit)
            })?,
            None => call.await,
        }
    }

    async fn call<T: HttpClient>(
        &self,
        client: &T,
        request: &UpstreamRequest,
    ) -> Result<UpstreamResult, RelayError> {
        let payload = serde_json::to_vec(request).map_err(|e| {
            RelayError::Internal(format!("failed to serialize upstream request: {e}"))
        })?;

        let req = Request::builder()
            .method(Method::POST)
            .uri(self.completions_uri.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, self.authorization.clone())
            .body(Body::from(payload))
            .map_err(|e| RelayError::Internal(format!("failed to build upstream request: {e}")))?;

        debug!("Forwarding request to {}", self.completions_uri);

        let response = client.request(req).await.map_err(|e| {
            error!(
                "Error forwarding request to upstream {}: {}",
                self.completions_uri, e
            );
            RelayError::UpstreamUnreachable(e.to_string())
        })?;

        let status = response.status();
        if request.stream {
            debug!(%status, "Upstream stream opened");
            return Ok(UpstreamResult::Stream(response));
        }

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| {
                error!("Failed reading upstream body: {}", e);
                RelayError::UpstreamUnreachable(format!("failed reading upstream body: {e}"))
            })?;
        debug!(%status, len = bytes.len(), "Upstream body buffered");

        let body = serde_json::from_slice(&bytes).map_err(|e| {
            warn!(%status, "Upstream returned a non-JSON body");
            RelayError::UpstreamProtocolError(format!(
                "upstream returned a non-JSON body (status {status}): {e}"
            ))
        })?;

        Ok(UpstreamResult::Buffered { status, body })
    }
}
