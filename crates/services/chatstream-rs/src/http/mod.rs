//! HTTP client for the chat REST API.
//!
//! Every REST endpoint answers with an [`ApiEnvelope`]; the typed methods here
//! unwrap it so the resource APIs deal in payloads only.

use crate::error::{ChatStreamError, Result};
use crate::types::ApiEnvelope;
use reqwest::{Client as ReqClient, Method, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod chat;
pub mod prompts;
pub mod sessions;

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the chat API, without trailing slash.
    pub base_url: String,
    /// Request timeout for REST calls.
    pub timeout: Duration,
}

/// HTTP client for the chat REST API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: ReqClient,
    cfg: HttpConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(cfg: HttpConfig) -> Result<Self> {
        let inner = ReqClient::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ChatStreamError::Network(e.to_string()))?;
        Ok(Self {
            inner,
            cfg: HttpConfig {
                base_url: cfg.base_url.trim_end_matches('/').to_string(),
                timeout: cfg.timeout,
            },
        })
    }

    /// Get the base URL.
    pub fn base(&self) -> &str {
        &self.cfg.base_url
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.base_url, path)
    }

    fn build_request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.inner.request(method, self.url(path))
    }

    // ==================== Typed HTTP Methods ====================

    /// GET request returning the envelope payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not 2xx, or the
    /// envelope reports failure.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .build_request(Method::GET, path)
            .send()
            .await
            .map_err(|e| ChatStreamError::Network(e.to_string()))?;
        Self::map_envelope_response(resp).await
    }

    /// GET request with query parameters returning the envelope payload.
    ///
    /// # Errors
    ///
    /// Same as [`HttpClient::get`].
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let resp = self
            .build_request(Method::GET, path)
            .query(query)
            .send()
            .await
            .map_err(|e| ChatStreamError::Network(e.to_string()))?;
        Self::map_envelope_response(resp).await
    }

    /// POST request with JSON body returning the envelope payload.
    ///
    /// # Errors
    ///
    /// Same as [`HttpClient::get`].
    pub async fn post<TReq: serde::Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes> {
        let resp = self
            .build_request(Method::POST, path)
            .json(body)
            .send()
            .await
            .map_err(|e| ChatStreamError::Network(e.to_string()))?;
        Self::map_envelope_response(resp).await
    }

    /// DELETE request whose envelope carries no payload.
    ///
    /// An empty body with a 2xx status also counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not 2xx, or the
    /// envelope reports failure.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let resp = self
            .build_request(Method::DELETE, path)
            .send()
            .await
            .map_err(|e| ChatStreamError::Network(e.to_string()))?;

        let bytes = Self::success_bytes(resp).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(&bytes)?.into_unit()
    }

    // ==================== Response Handling ====================

    /// Read the body, classifying non-2xx statuses from the error envelope.
    async fn success_bytes(resp: Response) -> Result<bytes::Bytes> {
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ChatStreamError::Network(e.to_string()))?;

        if !status.is_success() {
            let body_text = String::from_utf8_lossy(&bytes);
            return Err(ChatStreamError::http(status.as_u16(), &body_text));
        }
        Ok(bytes)
    }

    async fn map_envelope_response<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let bytes = Self::success_bytes(resp).await?;
        serde_json::from_slice::<ApiEnvelope<T>>(&bytes)?.into_result()
    }
}
