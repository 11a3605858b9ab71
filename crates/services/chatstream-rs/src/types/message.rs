//! Message and UI component types for chatstream_rs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageRole {
    /// Human turn.
    User,
    /// Model turn.
    Assistant,
    /// System prompt or notice.
    System,
    /// Function/tool output.
    Function,
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message identifier.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Author role.
    pub role: MessageRole,
    /// Text content. Grows while the turn streams.
    #[serde(default)]
    pub content: String,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
    /// Rich payloads attached to this turn, newest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ui_components: Vec<UiComponentData>,
}

impl Message {
    /// A fresh message with a generated id.
    pub fn new(session_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            ui_components: Vec::new(),
        }
    }
}

/// Tool payload carried by a UI component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentData {
    /// Tool that produced the payload.
    #[serde(default)]
    pub tool_name: String,
    /// MCP server hosting the tool.
    #[serde(default)]
    pub server_name: String,
    /// Opaque tool output.
    #[serde(default)]
    pub tool_data: serde_json::Value,
}

/// A rich card attached to an assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiComponentData {
    /// Component kind, e.g. `employee_info`.
    pub component_type: String,
    /// Component payload.
    #[serde(default)]
    pub component_data: ComponentData,
    /// When the component arrived.
    pub timestamp: DateTime<Utc>,
}
