//! Byte-stream transport for streaming responses.
//!
//! The transport performs one HTTP call and hands back the raw response body
//! as a stream of [`Bytes`]. It knows nothing about SSE framing and does not
//! interpret non-2xx statuses.

use crate::error::{ChatStreamError, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqClient, Method, StatusCode};
use std::pin::Pin;
use std::time::Duration;

/// Raw response body as a stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send + 'static>>;

/// Connect timeout for the default streaming client.
///
/// There is deliberately no overall request timeout: an open stream may stay
/// idle for as long as the server keeps it.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Description of a streaming HTTP request.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL without query string.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
}

impl StreamRequest {
    /// A request with the given method and URL and no headers.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    /// A `GET` request carrying `Accept: text/event-stream` and
    /// `Cache-Control: no-cache`.
    pub fn event_stream(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
    }

    /// Set a header, replacing any previous value.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Response whose body has not been read yet.
pub struct RawResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Undecoded body.
    pub body: ByteStream,
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl RawResponse {
    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Pass a 2xx response through; otherwise read the body and turn it
    /// into [`ChatStreamError::Http`].
    ///
    /// # Errors
    ///
    /// Returns the classified HTTP error for non-2xx responses.
    pub async fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let status = self.status.as_u16();
        let chunks: Vec<Bytes> = match self.body.try_collect().await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::debug!(status, error = %e, "failed to read error response body");
                Vec::new()
            }
        };
        let body = String::from_utf8_lossy(&chunks.concat()).into_owned();
        Err(ChatStreamError::http(status, &body))
    }
}

/// HTTP transport that exposes response bodies as byte streams.
#[derive(Clone)]
pub struct Transport {
    inner: ReqClient,
}

impl Transport {
    /// Create a transport with the default streaming client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let inner = ReqClient::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ChatStreamError::Network(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Route requests through a caller-supplied client.
    pub fn with_client(client: ReqClient) -> Self {
        Self { inner: client }
    }

    /// Perform the request and return the unread response.
    ///
    /// Non-2xx statuses are returned as-is.
    ///
    /// # Errors
    ///
    /// Returns [`ChatStreamError::Network`] if the request cannot be sent.
    pub async fn send(&self, req: StreamRequest) -> Result<RawResponse> {
        let mut builder = self.inner.request(req.method, &req.url).headers(req.headers);
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ChatStreamError::Network(e.to_string()))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        tracing::debug!(url = %req.url, %status, "stream response received");

        let body = resp
            .bytes_stream()
            .map_err(|e| ChatStreamError::Network(e.to_string()))
            .boxed();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
