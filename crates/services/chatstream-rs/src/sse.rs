//! Server-Sent Events decoding.
//!
//! [`SseDecoder`] turns an arbitrary chunking of bytes into [`SseFrame`]s and
//! [`event_stream`] lifts a byte stream into a stream of typed
//! [`StreamEvent`]s.

use crate::error::{ChatStreamError, Result};
use crate::types::event::{ErrorPayload, StreamEvent};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::pin::Pin;

/// Stream of decoded chat events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send + 'static>>;

/// Event name used when a record carries no `event:` line.
pub const DEFAULT_EVENT: &str = "message";

/// When a record is considered complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SseFraming {
    /// Dispatch as soon as a `data:` line is seen. The chat server emits
    /// exactly one `data:` line per record, so this never splits a payload.
    #[default]
    Eager,
    /// Dispatch on the blank-line terminator; multiple `data:` lines are
    /// joined with `\n`.
    Standard,
}

/// One SSE record: optional event name and its data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Event type (from the `event:` line).
    pub event: Option<String>,
    /// Data payload (from `data:` lines).
    pub data: String,
}

/// Incremental SSE decoder.
///
/// Lines are split on `\n` at the byte level and only decoded once complete,
/// so a multi-byte character split across two chunks decodes correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    framing: SseFraming,
    buffer: Vec<u8>,
    pending_event: Option<String>,
    pending_data: Option<String>,
}

impl SseDecoder {
    /// Create a decoder with [`SseFraming::Eager`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with the given framing.
    #[must_use]
    pub fn with_framing(framing: SseFraming) -> Self {
        Self {
            framing,
            ..Self::default()
        }
    }

    /// Push a chunk of bytes and return any frames it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..pos]);
            self.process_line(&text, &mut frames);
        }
        frames
    }

    /// Process any unterminated remainder and return the final frames.
    pub fn flush(&mut self) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let text = String::from_utf8_lossy(&rest);
            self.process_line(&text, &mut frames);
        }
        self.dispatch(&mut frames);
        frames
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        let line = line.trim();
        if line.is_empty() {
            if self.framing == SseFraming::Standard {
                self.dispatch(frames);
            }
            return;
        }

        if let Some(value) = line.strip_prefix("event:") {
            if self.framing == SseFraming::Eager {
                self.dispatch(frames);
            }
            self.pending_event = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            let value = value.trim_start();
            match self.framing {
                SseFraming::Eager => {
                    self.pending_data = Some(value.to_string());
                    self.dispatch(frames);
                }
                SseFraming::Standard => match &mut self.pending_data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => self.pending_data = Some(value.to_string()),
                },
            }
        }
        // id:, retry: and `:` comments are ignored
    }

    fn dispatch(&mut self, frames: &mut Vec<SseFrame>) {
        let event = self.pending_event.take();
        if let Some(data) = self.pending_data.take() {
            frames.push(SseFrame { event, data });
        }
    }
}

impl StreamEvent {
    /// Parse an SSE frame into a typed event.
    ///
    /// # Errors
    ///
    /// Returns [`ChatStreamError::Decode`] if the data is not JSON or does not
    /// match the payload shape of its event type.
    pub fn from_frame(frame: &SseFrame) -> Result<Self> {
        let event_type = frame.event.as_deref().unwrap_or(DEFAULT_EVENT);
        let value: serde_json::Value =
            serde_json::from_str(&frame.data).map_err(|e| decode_error(event_type, &e))?;

        Ok(match event_type {
            "status" => Self::Status(value),
            "message" => Self::Message(parse_payload(event_type, value)?),
            "ui_component" => Self::UiComponent(parse_payload(event_type, value)?),
            "completed" => Self::Completed(value),
            "error" => Self::Error(ErrorPayload::from_value(value)),
            other => Self::Unknown {
                event: other.to_string(),
                data: value,
            },
        })
    }
}

fn parse_payload<T: DeserializeOwned>(event_type: &str, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| decode_error(event_type, &e))
}

fn decode_error(event_type: &str, e: &serde_json::Error) -> ChatStreamError {
    ChatStreamError::Decode {
        event: event_type.to_string(),
        message: e.to_string(),
    }
}

struct DecodeState<S> {
    body: Option<Pin<Box<S>>>,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
}

/// Decode a byte stream into a stream of [`StreamEvent`]s.
///
/// The returned stream ends after the body ends, after a `completed` or
/// `error` event, after a transport error, or after the first decode error. The body is dropped as soon as it is no
/// longer needed.
pub fn event_stream<S>(body: S, framing: SseFraming) -> EventStream
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    let state = DecodeState {
        body: Some(Box::pin(body)),
        decoder: SseDecoder::with_framing(framing),
        pending: VecDeque::new(),
    };

    let events = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(frame) = st.pending.pop_front() {
                return match StreamEvent::from_frame(&frame) {
                    Ok(event) => {
                        if event.is_terminal() {
                            st.pending.clear();
                            st.body = None;
                        }
                        Some((Ok(event), st))
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to decode SSE frame");
                        st.pending.clear();
                        st.body = None;
                        Some((Err(e), st))
                    }
                };
            }

            let body = st.body.as_mut()?;
            let next = body.next().await;
            match next {
                Some(Ok(chunk)) => {
                    let frames = st.decoder.push(&chunk);
                    st.pending.extend(frames);
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "SSE body failed");
                    st.body = None;
                    return Some((Err(e), st));
                }
                None => {
                    st.body = None;
                    let frames = st.decoder.flush();
                    st.pending.extend(frames);
                }
            }
        }
    });

    Box::pin(events.fuse())
}

/// End `events` right after its first `completed` or `error` event.
///
/// The inner stream is dropped once the terminal event has been yielded, so a
/// server that keeps the connection open cannot hold the reader.
pub fn until_terminal<S>(events: S) -> EventStream
where
    S: Stream<Item = Result<StreamEvent>> + Send + 'static,
{
    let events = futures::stream::unfold(Some(Box::pin(events)), |state| async move {
        let mut inner = state?;
        let item = inner.next().await?;
        let done = matches!(&item, Ok(event) if event.is_terminal());
        Some((item, (!done).then_some(inner)))
    });
    Box::pin(events.fuse())
}

/// Decode a complete payload in one go. Handy for fixtures and replay.
///
/// # Errors
///
/// Returns the first decode error encountered.
pub fn decode_all(payload: &[u8], framing: SseFraming) -> Result<Vec<StreamEvent>> {
    let mut decoder = SseDecoder::with_framing(framing);
    let mut frames = decoder.push(payload);
    frames.extend(decoder.flush());
    frames.iter().map(StreamEvent::from_frame).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::event::ContentType;

    #[test]
    fn decoder_flushes_on_data_line() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: message\ndata: {\"contentType\":\"assistant\",\"content\":\"Hi\"}\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("message"));
    }

    #[test]
    fn decoder_holds_incomplete_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: status\nda").is_empty());
        let frames = decoder.push(b"ta: {}\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("status"));
        assert_eq!(frames[0].data, "{}");
    }

    #[test]
    fn decoder_defaults_event_type() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"data: {\"contentType\":\"user\",\"content\":\"q\"}\n");
        let event = StreamEvent::from_frame(&frames[0]).unwrap();
        assert_eq!(event.event_type(), "message");
    }

    #[test]
    fn decoder_ignores_comments_and_ids() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keepalive\nid: 7\nretry: 1000\nevent: completed\ndata: {}\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("completed"));
    }

    #[test]
    fn decoder_handles_crlf() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: completed\r\ndata: {}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{}");
    }

    #[test]
    fn decoder_flush_processes_remainder() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: completed\ndata: {}").is_empty());
        let frames = decoder.flush();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("completed"));
    }

    #[test]
    fn decoder_utf8_split_across_chunks() {
        let payload = "event: message\ndata: {\"contentType\":\"assistant\",\"content\":\"héllo\"}\n";
        let bytes = payload.as_bytes();
        let split = payload.find('é').unwrap() + 1; // inside the two-byte sequence

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let frames = decoder.push(&bytes[split..]);
        match StreamEvent::from_frame(&frames[0]).unwrap() {
            StreamEvent::Message(c) => assert_eq!(c.content, "héllo"),
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn standard_framing_joins_data_lines() {
        let mut decoder = SseDecoder::with_framing(SseFraming::Standard);
        assert!(decoder.push(b"event: status\ndata: [1,\ndata: 2]\n").is_empty());
        let frames = decoder.push(b"\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "[1,\n2]");
    }

    #[test]
    fn standard_framing_drops_event_without_data() {
        let mut decoder = SseDecoder::with_framing(SseFraming::Standard);
        assert!(decoder.push(b"event: status\n\n").is_empty());
        let frames = decoder.push(b"data: {}\n\n");
        assert_eq!(frames[0].event, None);
    }

    #[test]
    fn from_frame_maps_each_event_type() {
        let cases = [
            ("status", "{\"status\":\"thinking\"}", "status"),
            ("message", "{\"contentType\":\"assistant\",\"content\":\"x\"}", "message"),
            (
                "ui_component",
                "{\"componentType\":\"card\",\"componentData\":{\"toolName\":\"t\",\"serverName\":\"s\",\"toolData\":{}}}",
                "ui_component",
            ),
            ("completed", "{}", "completed"),
            ("error", "{\"message\":\"boom\"}", "error"),
            ("heartbeat", "{}", "heartbeat"),
        ];
        for (event, data, expected) in cases {
            let frame = SseFrame {
                event: Some(event.to_string()),
                data: data.to_string(),
            };
            let parsed = StreamEvent::from_frame(&frame).unwrap();
            assert_eq!(parsed.event_type(), expected);
        }
    }

    #[test]
    fn from_frame_rejects_invalid_json() {
        let frame = SseFrame {
            event: Some("message".to_string()),
            data: "{not json".to_string(),
        };
        match StreamEvent::from_frame(&frame) {
            Err(ChatStreamError::Decode { event, .. }) => assert_eq!(event, "message"),
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn from_frame_rejects_wrong_message_shape() {
        let frame = SseFrame {
            event: Some("message".to_string()),
            data: "{\"content\":\"missing type\"}".to_string(),
        };
        assert!(matches!(
            StreamEvent::from_frame(&frame),
            Err(ChatStreamError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn event_stream_stops_after_decode_error() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"event: message\ndata: {\"contentType\":\"assistant\",\"content\":\"a\"}\n")),
            Ok(Bytes::from_static(b"event: message\ndata: nope\n")),
            Ok(Bytes::from_static(b"event: completed\ndata: {}\n")),
        ];
        let mut events = event_stream(futures::stream::iter(chunks), SseFraming::Eager);

        match events.next().await {
            Some(Ok(StreamEvent::Message(c))) => {
                assert_eq!(c.content_type, ContentType::Assistant);
                assert_eq!(c.content, "a");
            }
            other => panic!("expected first message, got {other:?}"),
        }
        assert!(matches!(events.next().await, Some(Err(ChatStreamError::Decode { .. }))));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn event_stream_ends_at_completed_on_open_body() {
        let body = futures::stream::iter(vec![Ok(Bytes::from_static(
            b"event: message\ndata: {\"contentType\":\"assistant\",\"content\":\"Hi\"}\nevent: completed\ndata: {}\nevent: status\ndata: {}\n",
        ))])
        .chain(futures::stream::pending());
        let mut events = event_stream(body, SseFraming::Eager);

        assert!(matches!(events.next().await, Some(Ok(StreamEvent::Message(_)))));
        assert!(matches!(events.next().await, Some(Ok(StreamEvent::Completed(_)))));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn until_terminal_drops_the_rest() {
        let inner = futures::stream::iter(vec![
            Ok(StreamEvent::Status(serde_json::json!({}))),
            Ok(StreamEvent::Error(crate::types::ErrorPayload::default())),
        ])
        .chain(futures::stream::pending());
        let events: Vec<_> = until_terminal(inner).collect().await;

        assert_eq!(events.len(), 2);
        assert!(events[1].as_ref().is_ok_and(StreamEvent::is_terminal));
    }

    #[tokio::test]
    async fn event_stream_propagates_body_error() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"event: status\ndata: {}\n")),
            Err(ChatStreamError::Network("connection reset".into())),
        ];
        let mut events = event_stream(futures::stream::iter(chunks), SseFraming::Eager);

        assert!(matches!(events.next().await, Some(Ok(StreamEvent::Status(_)))));
        assert!(matches!(events.next().await, Some(Err(ChatStreamError::Network(_)))));
        assert!(events.next().await.is_none());
    }

    #[test]
    fn decode_all_includes_unterminated_tail() {
        let events = decode_all(b"event: status\ndata: {}\nevent: completed\ndata: {}", SseFraming::Eager).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
    }
}
