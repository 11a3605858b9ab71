//! Sessions API.
//!
//! Endpoints for creating, listing, and deleting chat sessions.

use crate::error::Result;
use crate::http::HttpClient;
use crate::types::{CreateSessionRequest, Message, Session, SessionWithMessages};

/// Sessions API client.
#[derive(Debug, Clone)]
pub struct SessionsApi {
    http: HttpClient,
}

impl SessionsApi {
    /// Create a new Sessions API client.
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Create a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create(&self, req: &CreateSessionRequest) -> Result<Session> {
        self.http.post("/sessions", req).await
    }

    /// Get a session by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get(&self, id: &str) -> Result<Session> {
        self.http.get(&format!("/sessions/{id}")).await
    }

    /// Messages of a session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn messages(&self, id: &str) -> Result<Vec<Message>> {
        self.http.get(&format!("/sessions/{id}/messages")).await
    }

    /// A session together with its messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_with_messages(&self, id: &str) -> Result<SessionWithMessages> {
        self.http.get(&format!("/sessions/{id}/full")).await
    }

    /// List sessions, optionally only those owned by `owner_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list(&self, owner_id: Option<&str>) -> Result<Vec<Session>> {
        match owner_id {
            Some(owner) => {
                self.http
                    .get_with_query("/sessions", &[("userId", owner)])
                    .await
            }
            None => self.http.get("/sessions").await,
        }
    }

    /// Delete a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.http.delete(&format!("/sessions/{id}")).await
    }
}
