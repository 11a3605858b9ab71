//! Session types for chatstream_rs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::message::Message;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Conversation is open.
    #[default]
    Active,
    /// Conversation is on hold.
    Paused,
    /// Conversation reached its end.
    Completed,
    /// Conversation was closed by the user or server.
    Closed,
}

/// A chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque session identifier.
    pub id: String,
    /// Session title.
    #[serde(default)]
    pub title: String,
    /// Session status.
    #[serde(default)]
    pub status: SessionStatus,
    /// Owner (user) identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Number of messages in the session.
    #[serde(default)]
    pub message_count: u32,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request to create a new session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Session title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Owner of the new session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// A session together with its full message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWithMessages {
    /// The session.
    pub session: Session,
    /// Its messages, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Title for a session started by `text`: its first `max_chars` characters.
pub fn title_from_message(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
