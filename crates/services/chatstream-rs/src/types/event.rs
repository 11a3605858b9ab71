//! Stream event types for chatstream_rs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::message::{ComponentData, UiComponentData};

/// A decoded event from the chat stream.
///
/// One variant per `event:` name. The payload of each variant is the JSON
/// object carried on the matching `data:` line.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Progress signal (`status`). The payload shape is not fixed.
    Status(serde_json::Value),
    /// Chat text (`message`): a user echo or an assistant token.
    Message(ChatContent),
    /// Rich payload for the side panel (`ui_component`).
    UiComponent(UiComponentPayload),
    /// Turn finished (`completed`).
    Completed(serde_json::Value),
    /// Server-side failure carried in-band (`error`).
    Error(ErrorPayload),
    /// Event name this client does not know.
    Unknown {
        /// Raw event name.
        event: String,
        /// Parsed payload.
        data: serde_json::Value,
    },
}

impl StreamEvent {
    /// Wire name of this event.
    pub fn event_type(&self) -> &str {
        match self {
            Self::Status(_) => "status",
            Self::Message(_) => "message",
            Self::UiComponent(_) => "ui_component",
            Self::Completed(_) => "completed",
            Self::Error(_) => "error",
            Self::Unknown { event, .. } => event,
        }
    }

    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Error(_))
    }
}

/// Who a `message` event speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Server echo of the user's turn.
    User,
    /// Assistant token.
    Assistant,
    /// Fallback for unknown content types.
    #[serde(other)]
    Other,
}

/// Payload of a `message` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContent {
    /// Content type.
    pub content_type: ContentType,
    /// Text for a user echo, or one token for the assistant.
    #[serde(default)]
    pub content: String,
    /// Session the content belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Server-assigned message id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Payload of a `ui_component` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiComponentPayload {
    /// Component kind.
    pub component_type: String,
    /// Tool payload.
    #[serde(default)]
    pub component_data: ComponentData,
    /// Server timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl UiComponentPayload {
    /// Stamp the payload into a [`UiComponentData`], defaulting the time to now.
    pub fn into_component(self) -> UiComponentData {
        UiComponentData {
            component_type: self.component_type,
            component_data: self.component_data,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

/// Payload of an `error` event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Error message.
    #[serde(default)]
    pub message: Option<String>,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Additional properties.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ErrorPayload {
    /// Lenient conversion: a bare string becomes the message, any other
    /// non-object value is kept under `extra["detail"]`.
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(message) => Self {
                message: Some(message),
                ..Self::default()
            },
            serde_json::Value::Object(map) => {
                let value = serde_json::Value::Object(map);
                serde_json::from_value(value.clone()).unwrap_or_else(|_| Self::with_detail(value))
            }
            other => Self::with_detail(other),
        }
    }

    fn with_detail(value: serde_json::Value) -> Self {
        let mut extra = serde_json::Map::new();
        extra.insert("detail".to_string(), value);
        Self {
            extra,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_content_unknown_type_is_other() {
        let json = r#"{"contentType":"thinking","content":"..."}"#;
        let content: ChatContent = serde_json::from_str(json).unwrap();
        assert_eq!(content.content_type, ContentType::Other);
    }

    #[test]
    fn ui_component_payload_defaults_timestamp() {
        let json = r#"{"componentType":"employee_info","componentData":{"toolName":"lookup","serverName":"hr","toolData":{}}}"#;
        let payload: UiComponentPayload = serde_json::from_str(json).unwrap();
        let before = Utc::now();
        let comp = payload.into_component();
        assert_eq!(comp.component_type, "employee_info");
        assert!(comp.timestamp >= before);
    }

    #[test]
    fn terminal_events() {
        assert!(StreamEvent::Completed(serde_json::json!({})).is_terminal());
        assert!(StreamEvent::Error(ErrorPayload::default()).is_terminal());
        assert!(!StreamEvent::Status(serde_json::json!({})).is_terminal());
    }

    #[test]
    fn error_payload_is_lenient() {
        let p = ErrorPayload::from_value(serde_json::json!("boom"));
        assert_eq!(p.message.as_deref(), Some("boom"));

        let p = ErrorPayload::from_value(serde_json::json!({"message": "bad", "code": "E1", "retry": false}));
        assert_eq!(p.code.as_deref(), Some("E1"));
        assert_eq!(p.extra["retry"], false);

        let p = ErrorPayload::from_value(serde_json::json!(42));
        assert_eq!(p.extra["detail"], 42);
    }
}
