//! Streaming chat API.
//!
//! `GET /stream` answers with an SSE body that is decoded into
//! [`StreamEvent`](crate::types::StreamEvent)s.

use crate::backend::StreamParams;
use crate::error::Result;
use crate::http::HttpClient;
use crate::sse::{EventStream, SseFraming, event_stream};
use crate::transport::{RawResponse, StreamRequest, Transport};

/// Streaming chat API client.
#[derive(Clone)]
pub struct ChatApi {
    http: HttpClient,
    transport: Transport,
    framing: SseFraming,
}

impl ChatApi {
    /// Create a new Chat API client.
    pub fn new(http: HttpClient, transport: Transport, framing: SseFraming) -> Self {
        Self {
            http,
            transport,
            framing,
        }
    }

    /// The request that opens the stream for `params`.
    pub fn stream_request(&self, params: &StreamParams) -> StreamRequest {
        params
            .query_pairs()
            .into_iter()
            .fold(StreamRequest::event_stream(self.http.url("/stream")), |req, (k, v)| {
                req.query(k, v)
            })
    }

    /// Open the stream and return the undecoded response, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    pub async fn open(&self, params: &StreamParams) -> Result<RawResponse> {
        self.transport.send(self.stream_request(params)).await
    }

    /// Open the stream and decode it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the status is not 2xx.
    pub async fn stream(&self, params: &StreamParams) -> Result<EventStream> {
        let resp = self.open(params).await?.error_for_status().await?;
        tracing::debug!(session_id = %params.session_id, "chat stream connected");
        Ok(event_stream(resp.body, self.framing))
    }
}
