//! Chunk-boundary invariance of the SSE decoder.
//!
//! However the transport slices the body, the decoder must yield the same
//! events as decoding the whole payload at once.

use bytes::Bytes;
use chatstream_rs::sse::{SseFraming, decode_all, event_stream};
use chatstream_rs::types::{ContentType, StreamEvent};
use chatstream_rs::{ChatStreamError, SseDecoder};
use futures::StreamExt;
use proptest::prelude::*;

const TRANSCRIPT: &str = concat!(
    "event: status\n",
    "data: {\"status\":\"thinking\"}\n\n",
    "event: message\n",
    "data: {\"contentType\":\"user\",\"content\":\"Grüß dich 👋\",\"messageId\":\"u-1\"}\n\n",
    "event: message\n",
    "data: {\"contentType\":\"assistant\",\"content\":\"Hel\"}\n\n",
    "event: ui_component\n",
    "data: {\"componentType\":\"employee_info\",\"componentData\":{\"toolName\":\"lookup\",\"serverName\":\"hr\",\"toolData\":{\"name\":\"Ada\"}}}\n\n",
    "event: message\n",
    "data: {\"contentType\":\"assistant\",\"content\":\"lo\"}\n\n",
    "event: completed\n",
    "data: {}\n\n",
);

fn decode_chunks(chunks: &[&[u8]]) -> Vec<StreamEvent> {
    let mut decoder = SseDecoder::new();
    let mut frames = Vec::new();
    for chunk in chunks {
        frames.extend(decoder.push(chunk));
    }
    frames.extend(decoder.flush());
    frames
        .iter()
        .map(|f| StreamEvent::from_frame(f).unwrap())
        .collect()
}

fn assistant_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Message(c) if c.content_type == ContentType::Assistant => {
                Some(c.content.as_str())
            }
            _ => None,
        })
        .collect()
}

#[test]
fn whole_transcript_decodes() {
    let events = decode_all(TRANSCRIPT.as_bytes(), SseFraming::Eager).unwrap();
    let kinds: Vec<_> = events.iter().map(StreamEvent::event_type).collect();
    assert_eq!(
        kinds,
        vec![
            "status",
            "message",
            "message",
            "ui_component",
            "message",
            "completed"
        ]
    );
    assert_eq!(assistant_text(&events), "Hello");
}

#[test]
fn every_single_split_offset() {
    let payload = TRANSCRIPT.as_bytes();
    let expected = decode_chunks(&[payload]);

    for offset in 0..=payload.len() {
        let (a, b) = payload.split_at(offset);
        assert_eq!(decode_chunks(&[a, b]), expected, "split at byte {offset}");
    }
}

#[test]
fn one_byte_at_a_time() {
    let payload = TRANSCRIPT.as_bytes();
    let chunks: Vec<&[u8]> = payload.chunks(1).collect();
    assert_eq!(
        decode_chunks(&chunks),
        decode_chunks(&[payload]),
    );
}

#[test]
fn standard_framing_agrees_on_single_data_lines() {
    let eager = decode_all(TRANSCRIPT.as_bytes(), SseFraming::Eager).unwrap();
    let standard = decode_all(TRANSCRIPT.as_bytes(), SseFraming::Standard).unwrap();
    assert_eq!(eager, standard);
}

#[tokio::test]
async fn event_stream_over_split_body() {
    let payload = TRANSCRIPT.as_bytes();
    let chunks: Vec<chatstream_rs::Result<Bytes>> = payload
        .chunks(7)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();

    let events: Vec<_> = event_stream(futures::stream::iter(chunks), SseFraming::Eager)
        .map(Result::unwrap)
        .collect()
        .await;

    assert_eq!(events, decode_all(payload, SseFraming::Eager).unwrap());
}

#[tokio::test]
async fn transport_error_ends_the_stream() {
    let chunks = vec![
        Ok(Bytes::from_static(b"event: message\ndata: {\"contentType\":\"assistant\",\"content\":\"Hel\"}\n")),
        Err(ChatStreamError::Network("connection reset".into())),
        Ok(Bytes::from_static(b"event: completed\ndata: {}\n")),
    ];

    let items: Vec<_> = event_stream(futures::stream::iter(chunks), SseFraming::Eager)
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(matches!(items[1], Err(ChatStreamError::Network(_))));
}

proptest! {
    #[test]
    fn random_chunkings_decode_identically(cuts in proptest::collection::vec(0usize..=TRANSCRIPT.len(), 0..24)) {
        let payload = TRANSCRIPT.as_bytes();
        let mut cuts = cuts;
        cuts.sort_unstable();
        cuts.dedup();

        let mut chunks = Vec::new();
        let mut start = 0;
        for cut in cuts {
            chunks.push(&payload[start..cut]);
            start = cut;
        }
        chunks.push(&payload[start..]);

        let events = decode_chunks(&chunks);
        prop_assert_eq!(assistant_text(&events), "Hello");
        prop_assert_eq!(events, decode_chunks(&[payload]));
    }
}
