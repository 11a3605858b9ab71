//! High-level client API for the chat server.
//!
//! This module provides the ergonomic `Client` and `ClientBuilder` types.

use crate::backend::{ChatBackend, StreamParams};
use crate::config::{CHATSTREAM_DEFAULT_BASE, ChatConfig, DEFAULT_TIMEOUT_SECS, validate_base_url};
use crate::error::Result;
use crate::http::chat::ChatApi;
use crate::http::prompts::PromptsApi;
use crate::http::sessions::SessionsApi;
use crate::http::{HttpClient, HttpConfig};
use crate::sse::{EventStream, SseFraming};
use crate::transport::Transport;
use crate::types::{CreateSessionRequest, Message, QuickPrompt, Session};
use async_trait::async_trait;
use reqwest::Client as ReqClient;
use std::time::Duration;

/// Chat client for the REST and streaming endpoints.
#[derive(Clone)]
pub struct Client {
    http: HttpClient,
    transport: Transport,
    framing: SseFraming,
}

/// Builder for creating a [`Client`].
#[derive(Clone)]
pub struct ClientBuilder {
    base_url: String,
    timeout: Duration,
    stream_client: Option<ReqClient>,
    framing: SseFraming,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            base_url: CHATSTREAM_DEFAULT_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            stream_client: None,
            framing: SseFraming::default(),
        }
    }
}

impl ClientBuilder {
    /// Create a new client builder with default settings.
    ///
    /// Default settings:
    /// - Base URL: `http://127.0.0.1:8080/api/chat`
    /// - Timeout: 300 seconds for REST calls; streams have none
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a [`ChatConfig`].
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            timeout: config.timeout(),
            ..Self::default()
        }
    }

    /// Set the base URL of the chat API.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the REST request timeout in seconds.
    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Route streaming requests through `client`.
    #[must_use]
    pub fn stream_client(mut self, client: ReqClient) -> Self {
        self.stream_client = Some(client);
        self
    }

    /// Set the SSE framing mode.
    #[must_use]
    pub fn framing(mut self, framing: SseFraming) -> Self {
        self.framing = framing;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is unusable or an HTTP client cannot
    /// be built.
    pub fn build(self) -> Result<Client> {
        validate_base_url(&self.base_url)?;

        let http = HttpClient::new(HttpConfig {
            base_url: self.base_url,
            timeout: self.timeout,
        })?;
        let transport = match self.stream_client {
            Some(client) => Transport::with_client(client),
            None => Transport::new()?,
        };

        Ok(Client {
            http,
            transport,
            framing: self.framing,
        })
    }
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Build a client from a [`ChatConfig`].
    ///
    /// # Errors
    ///
    /// Same as [`ClientBuilder::build`].
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        ClientBuilder::from_config(config).build()
    }

    /// Get the sessions API.
    pub fn sessions(&self) -> SessionsApi {
        SessionsApi::new(self.http.clone())
    }

    /// Get the quick prompts API.
    pub fn prompts(&self) -> PromptsApi {
        PromptsApi::new(self.http.clone())
    }

    /// Get the streaming chat API.
    pub fn chat(&self) -> ChatApi {
        ChatApi::new(self.http.clone(), self.transport.clone(), self.framing)
    }

    /// The base URL.
    pub fn base_url(&self) -> &str {
        self.http.base()
    }
}

#[async_trait]
impl ChatBackend for Client {
    async fn create_session(&self, req: &CreateSessionRequest) -> Result<Session> {
        self.sessions().create(req).await
    }

    async fn list_sessions(&self, owner_id: Option<&str>) -> Result<Vec<Session>> {
        self.sessions().list(owner_id).await
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        self.sessions().delete(id).await
    }

    async fn session_messages(&self, id: &str) -> Result<Vec<Message>> {
        self.sessions().messages(id).await
    }

    async fn quick_prompts(&self) -> Result<Vec<QuickPrompt>> {
        self.prompts().list().await
    }

    async fn open_stream(&self, params: &StreamParams) -> Result<EventStream> {
        self.chat().stream(params).await
    }
}
