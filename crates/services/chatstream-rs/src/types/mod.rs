//! Core types for chatstream_rs.
//!
//! This module contains session, message, stream event, and REST envelope types.

pub mod api;
pub mod event;
pub mod message;
pub mod session;

pub use api::*;
pub use event::*;
pub use message::*;
pub use session::*;
