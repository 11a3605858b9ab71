//! Streaming chat client: SSE decoding, cancellable stream consumption, and
//! conversation state.
//!
//! The pieces stack leaves-first:
//!
//! - [`transport`] turns an HTTP response body into a byte stream,
//! - [`sse`] decodes bytes into typed [`StreamEvent`]s across arbitrary chunking,
//! - [`consumer`] drives any fallible stream with cooperative cancellation,
//! - [`orchestrator`] folds chat events into sessions and messages.
//!
//! ```no_run
//! use chatstream_rs::{ChatConfig, ChatOrchestrator, Client, OrchestratorConfig};
//!
//! # async fn run() -> chatstream_rs::Result<()> {
//! let config = ChatConfig::new();
//! let client = Client::from_config(&config)?;
//! let chat = ChatOrchestrator::new(client, OrchestratorConfig::from_chat_config(&config));
//!
//! chat.handle_send_message("What is my leave balance?").await;
//! for message in chat.messages() {
//!     println!("{:?}: {}", message.role, message.content);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(rust_2018_idioms)]

pub mod backend;
pub mod config;
pub mod consumer;
pub mod error;
pub mod orchestrator;
pub mod sse;
pub mod test_support;
pub mod types;

#[cfg(feature = "http")]
pub mod transport;

#[cfg(feature = "http")]
pub mod http;

// Public ergonomic API
#[cfg(feature = "http")]
pub mod client;

// Re-exports
pub use crate::backend::{ChatBackend, StreamParams};
#[cfg(feature = "http")]
pub use crate::client::{Client, ClientBuilder};
pub use crate::config::{ChatConfig, ComponentMirrorPolicy, OrchestratorConfig};
pub use crate::consumer::{ReadOutcome, StreamConsumer, StreamHandler};
pub use crate::error::{ChatStreamError, Result};
pub use crate::orchestrator::{ChatOrchestrator, ChatUpdate, SendOutcome};
pub use crate::sse::{EventStream, SseDecoder, SseFraming, until_terminal};
pub use crate::types::StreamEvent;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
