//! Dual-mode payload delivery.
//!
//! A request carries its payload either inline or as a URL to pull from;
//! both become the same chunked [`ByteStream`] so adapters never see the
//! difference.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use acthub_core::{ExecutionRequest, HubError, Payload, StreamError};

/// Chunked payload bytes, uniform across delivery modes.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Resolve the request's payload into a byte stream.
///
/// Inline bytes become a single-chunk stream; a download URL is opened and
/// its response body streamed. A request without a payload is a validation
/// error — the caller promised an attachment-bearing request type.
pub async fn payload_stream(request: &ExecutionRequest) -> Result<ByteStream, HubError> {
    let attachment = request
        .attachment
        .as_ref()
        .ok_or_else(|| HubError::validation("request carries no payload"))?;

    match &attachment.payload {
        Payload::Inline(bytes) => {
            let bytes = bytes.clone();
            Ok(futures::stream::once(async move { Ok(bytes) }).boxed())
        }
        Payload::Download(url) => {
            tracing::debug!(url = %url, "opening pulled payload");
            let response = reqwest::get(url.clone())
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| StreamError::Source(e.to_string()))?;
            Ok(response
                .bytes_stream()
                .map(|item| item.map_err(|e| StreamError::Source(e.to_string())))
                .boxed())
        }
    }
}

/// The raw streaming contract: invoke `sink` exactly once with the payload
/// byte stream. The call's result is whatever `sink` returns, so an adapter
/// can pipe bytes straight into an outbound upload without buffering.
pub async fn stream_payload<T, F, Fut>(request: &ExecutionRequest, sink: F) -> Result<T, HubError>
where
    F: FnOnce(ByteStream) -> Fut,
    Fut: Future<Output = Result<T, HubError>>,
{
    let bytes = payload_stream(request).await?;
    sink(bytes).await
}
