//! Error types for chatstream_rs.

use thiserror::Error;

/// Result type alias for chatstream_rs operations.
pub type Result<T> = std::result::Result<T, ChatStreamError>;

/// Error type for chatstream_rs operations.
#[derive(Debug, Error)]
pub enum ChatStreamError {
    /// The request never reached the server or never returned.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("HTTP error {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// `errorCode` from the response envelope, if the body carried one.
        error_code: Option<String>,
        /// `errorMessage` from the envelope, or the raw body.
        message: String,
    },

    /// The server answered 2xx with `success: false`.
    #[error("API error{}: {message}", error_code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Api {
        /// Server-side error code.
        error_code: Option<String>,
        /// Server-side error message.
        message: String,
    },

    /// Malformed SSE payload.
    #[error("Decode error in '{event}' event: {message}")]
    Decode {
        /// Event type of the offending frame.
        event: String,
        /// Parser message.
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// The stream was cancelled by the caller.
    #[error("Stream aborted")]
    Aborted,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal state error.
    #[error("Internal state error: {0}")]
    State(String),
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorEnvelope {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

impl ChatStreamError {
    /// Build an HTTP error from a status code and response body.
    ///
    /// Envelope bodies (`{ success, errorCode, errorMessage }`) are unpacked;
    /// anything else is kept verbatim as the message.
    pub fn http(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(env) if env.error_code.is_some() || env.error_message.is_some() => Self::Http {
                status,
                error_code: env.error_code,
                message: env.error_message.unwrap_or_default(),
            },
            _ => Self::Http {
                status,
                error_code: None,
                message: body.to_string(),
            },
        }
    }

    /// Whether this error is the cancellation sentinel.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Whether this is a 4xx HTTP error.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Http { status, .. } if (400..500).contains(status))
    }

    /// Whether this is a 5xx HTTP error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Http { status, .. } if *status >= 500)
    }

    /// Server-side error code, if any.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Http { error_code, .. } | Self::Api { error_code, .. } => error_code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ChatStreamError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_unpacks_envelope() {
        let body = r#"{"success":false,"errorCode":"SESSION_NOT_FOUND","errorMessage":"no such session"}"#;
        let err = ChatStreamError::http(404, body);
        assert!(err.is_client_error());
        assert_eq!(err.error_code(), Some("SESSION_NOT_FOUND"));
        assert_eq!(err.to_string(), "HTTP error 404: no such session");
    }

    #[test]
    fn http_error_keeps_plain_body() {
        let err = ChatStreamError::http(502, "Bad Gateway");
        assert!(err.is_server_error());
        assert!(err.error_code().is_none());
        match err {
            ChatStreamError::Http { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[test]
    fn api_error_display() {
        let err = ChatStreamError::Api {
            error_code: Some("E42".into()),
            message: "quota".into(),
        };
        assert_eq!(err.to_string(), "API error [E42]: quota");
    }

    #[test]
    fn abort_is_sentinel() {
        assert!(ChatStreamError::Aborted.is_abort());
        assert!(!ChatStreamError::Network("reset".into()).is_abort());
    }
}
