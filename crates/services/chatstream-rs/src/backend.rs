//! Seam between the orchestrator and the chat server.

use async_trait::async_trait;

use crate::error::Result;
use crate::sse::EventStream;
use crate::types::{CreateSessionRequest, Message, QuickPrompt, Session};

/// Parameters of one streaming turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamParams {
    /// Session the turn belongs to.
    pub session_id: String,
    /// User text.
    pub message: String,
    /// Sender id.
    pub user_id: Option<String>,
    /// Ask the server to stream thinking output.
    pub show_thinking: Option<bool>,
    /// Server-side typing speed hint.
    pub typing_speed: Option<u32>,
}

impl StreamParams {
    /// Parameters with only the required fields set.
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            user_id: None,
            show_thinking: None,
            typing_speed: None,
        }
    }

    /// Query string pairs, in wire order. Unset options are omitted.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("sessionId".to_string(), self.session_id.clone()),
            ("message".to_string(), self.message.clone()),
        ];
        if let Some(user_id) = &self.user_id {
            pairs.push(("userId".to_string(), user_id.clone()));
        }
        if let Some(show) = self.show_thinking {
            pairs.push(("showThinking".to_string(), show.to_string()));
        }
        if let Some(speed) = self.typing_speed {
            pairs.push(("typingSpeed".to_string(), speed.to_string()));
        }
        pairs
    }
}

/// Operations the orchestrator needs from the server.
///
/// [`crate::Client`] implements this over HTTP; tests substitute scripted
/// backends.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Create a session.
    async fn create_session(&self, req: &CreateSessionRequest) -> Result<Session>;

    /// List sessions, optionally filtered by owner.
    async fn list_sessions(&self, owner_id: Option<&str>) -> Result<Vec<Session>>;

    /// Delete a session.
    async fn delete_session(&self, id: &str) -> Result<()>;

    /// Message history of a session, oldest first.
    async fn session_messages(&self, id: &str) -> Result<Vec<Message>>;

    /// Canned prompts.
    async fn quick_prompts(&self) -> Result<Vec<QuickPrompt>>;

    /// Open the event stream for one turn.
    async fn open_stream(&self, params: &StreamParams) -> Result<EventStream>;
}
