//! REST envelope and collaborator payload types.

use serde::{Deserialize, Serialize};

use crate::error::{ChatStreamError, Result};

/// Uniform response envelope returned by every REST endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    /// Whether the call succeeded.
    pub success: bool,
    /// Payload on success.
    pub data: Option<T>,
    /// Error code on failure.
    #[serde(default)]
    pub error_code: Option<String>,
    /// Error message on failure.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, mapping `success: false` to [`ChatStreamError::Api`].
    ///
    /// A successful envelope without `data` is a state error; use
    /// [`ApiEnvelope::into_unit`] for endpoints that return nothing.
    pub fn into_result(self) -> Result<T> {
        if !self.success {
            return Err(self.into_api_error());
        }
        self.data
            .ok_or_else(|| ChatStreamError::State("envelope reported success without data".into()))
    }

    /// Check the envelope, discarding any payload.
    pub fn into_unit(self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(self.into_api_error())
        }
    }

    fn into_api_error(self) -> ChatStreamError {
        ChatStreamError::Api {
            error_code: self.error_code,
            message: self
                .error_message
                .unwrap_or_else(|| "request failed".to_string()),
        }
    }
}

/// A canned prompt offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickPrompt {
    /// Prompt identifier.
    pub id: String,
    /// Short label.
    pub title: String,
    /// Text sent when the prompt is picked.
    pub content: String,
    /// Optional grouping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}
