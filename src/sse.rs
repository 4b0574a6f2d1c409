//! SSE (Server-Sent Events) relay
//!
//! Streaming requests are not parsed or reframed: the upstream body is forwarded byte for byte.
//! A pump task moves chunks from the upstream body into a bounded channel whose receiver is the
//! outbound body, so a slow client slows down reads from the upstream instead of piling bytes up
//! in memory. Dropping either end stops the pump, and the upstream body (and with it the upstream
//! connection) is dropped along with it.

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Chunks buffered between the upstream read and the client write.
const RELAY_CHANNEL_CAPACITY: usize = 16;

/// Relay an upstream response as an event stream, keeping its status.
pub fn event_stream_response(upstream: Response) -> Response {
    let status = upstream.status();
    event_stream(status, upstream.into_body())
}

pub fn event_stream(status: StatusCode, upstream: Body) -> Response {
    let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
    tokio::spawn(pump(upstream.into_data_stream(), tx));

    let mut response = Body::from_stream(ReceiverStream::new(rx)).into_response();
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

async fn pump<S>(upstream: S, tx: mpsc::Sender<Result<Bytes, axum::Error>>)
where
    S: Stream<Item = Result<Bytes, axum::Error>>,
{
    let mut upstream = std::pin::pin!(upstream);
    let mut relayed = 0usize;

    loop {
        tokio::select! {
            _ = tx.closed() => {
                debug!(relayed, "Client went away, dropping upstream stream");
                break;
            }
            chunk = upstream.next() => match chunk {
                Some(Ok(bytes)) => {
                    relayed += bytes.len();
                    if tx.send(Ok(bytes)).await.is_err() {
                        debug!(relayed, "Client went away, dropping upstream stream");
                        break;
                    }
                }
                Some(Err(e)) => {
                    debug!(relayed, error = %e, "Upstream stream failed");
                    let _ = tx.send(Err(e)).await;
                    break;
                }
                None => {
                    debug!(relayed, "Upstream stream finished");
                    break;
                }
            }
        }
    }
}
