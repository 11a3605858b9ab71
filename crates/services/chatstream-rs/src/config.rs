//! Configuration for the chat client and orchestrator.

use serde::Deserialize;
use std::time::Duration;

/// Default chat API base URL.
pub const CHATSTREAM_DEFAULT_BASE: &str = "http://127.0.0.1:8080/api/chat";
/// Default timeout for REST calls, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Default number of characters of the first message used as session title.
pub const DEFAULT_TITLE_MAX_CHARS: usize = 50;
/// Default delay before a UI component is mirrored into the recent buffer.
pub const DEFAULT_MIRROR_DELAY: Duration = Duration::from_millis(100);

/// Env var holding the API base URL.
pub const ENV_BASE_URL: &str = "CHATSTREAM_BASE_URL";
/// Env var holding the user id.
pub const ENV_USER_ID: &str = "CHATSTREAM_USER_ID";
/// Env var holding the REST timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "CHATSTREAM_TIMEOUT_SECS";

/// Helper to read and normalize an env var (trim + filter empty).
fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Connection settings for the chat API.
///
/// Deserializing fills missing keys from the built-in defaults, never from the
/// environment. Use [`ChatConfig::new`] for env-driven settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    base_url: String,
    user_id: Option<String>,
    timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: CHATSTREAM_DEFAULT_BASE.to_string(),
            user_id: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ChatConfig {
    /// Creates a configuration from the environment.
    ///
    /// Reads:
    /// - `CHATSTREAM_BASE_URL` (defaults to `http://127.0.0.1:8080/api/chat`)
    /// - `CHATSTREAM_USER_ID`
    /// - `CHATSTREAM_TIMEOUT_SECS` (defaults to 300; unparsable values are ignored)
    #[must_use]
    pub fn new() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_trimmed(ENV_BASE_URL).unwrap_or(defaults.base_url),
            user_id: env_trimmed(ENV_USER_ID),
            timeout_secs: env_trimmed(ENV_TIMEOUT_SECS)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_url = base.into();
        self
    }

    /// Sets the user id sent with streams and used to filter sessions.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the REST timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Returns the configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the configured user id.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the REST timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Checks that the base URL parses.
    ///
    /// # Errors
    ///
    /// Same as [`validate_base_url`].
    pub fn validate(&self) -> crate::Result<()> {
        validate_base_url(&self.base_url)
    }
}

/// Checks that `base` parses as an absolute URL that can carry paths.
///
/// # Errors
///
/// Returns [`crate::ChatStreamError::Url`] if `base` does not parse and
/// [`crate::ChatStreamError::InvalidConfig`] if it cannot carry paths.
pub fn validate_base_url(base: &str) -> crate::Result<()> {
    let url = url::Url::parse(base)?;
    if url.cannot_be_a_base() {
        return Err(crate::ChatStreamError::InvalidConfig(format!(
            "base url '{base}' cannot be a base"
        )));
    }
    Ok(())
}

/// When UI components are mirrored into the recent-components buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentMirrorPolicy {
    /// Wait before mirroring. Zero mirrors immediately.
    pub delay: Duration,
}

impl Default for ComponentMirrorPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_MIRROR_DELAY,
        }
    }
}

impl ComponentMirrorPolicy {
    /// Mirror without waiting.
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }
}

/// Behaviour of a [`ChatOrchestrator`](crate::orchestrator::ChatOrchestrator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Owner id sent with streams and used to filter the session list.
    pub user_id: Option<String>,
    /// Characters of the first message used as a new session's title.
    pub title_max_chars: usize,
    /// Ask the server to stream thinking output.
    pub show_thinking: Option<bool>,
    /// Server-side typing speed hint.
    pub typing_speed: Option<u32>,
    /// Mirror timing for UI components.
    pub mirror: ComponentMirrorPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            user_id: None,
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
            show_thinking: None,
            typing_speed: None,
            mirror: ComponentMirrorPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Defaults, with the user id taken from `config`.
    pub fn from_chat_config(config: &ChatConfig) -> Self {
        Self {
            user_id: config.user_id().map(str::to_string),
            ..Self::default()
        }
    }

    /// Sets the owner id.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the mirror policy.
    #[must_use]
    pub fn with_mirror(mut self, mirror: ComponentMirrorPolicy) -> Self {
        self.mirror = mirror;
        self
    }

    /// Sets the title length.
    #[must_use]
    pub fn with_title_max_chars(mut self, n: usize) -> Self {
        self.title_max_chars = n;
        self
    }
}
