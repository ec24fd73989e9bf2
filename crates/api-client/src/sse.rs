//! Server-sent event decoding.
//!
//! The research service pushes one JSON frame per SSE event (`data: {...}`
//! followed by a blank line). Chunks from the transport can split events and
//! even UTF-8 sequences anywhere, so the decoder buffers raw bytes and only
//! decodes complete lines.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use marketlens_core::{FrameError, StreamFrame};
use std::collections::VecDeque;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// One event carried a payload that is not JSON; later events are fine
    #[error("malformed frame: {source}")]
    Malformed {
        payload: String,
        #[source]
        source: FrameError,
    },
    /// The connection failed; nothing more will arrive
    #[error("stream transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl StreamError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type FrameStream = Pin<Box<dyn Stream<Item = Result<StreamFrame, StreamError>> + Send>>;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Incremental SSE parser yielding the `data` of each complete event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the payloads of every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(payload) = self.accept_line(&line) {
                events.push(payload);
            }
        }
        events
    }

    /// Flush an event left open when the stream ends without a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(payload) = self.accept_line(&line) {
                return Some(payload);
            }
        }
        self.dispatch()
    }

    fn accept_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        // `event`, `id` and `retry` carry nothing this client uses
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data).join("\n"))
    }
}

struct FrameState {
    inner: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<Result<StreamFrame, StreamError>>,
    finished: bool,
}

impl FrameState {
    fn queue(&mut self, payloads: Vec<String>) {
        for payload in payloads {
            if payload.trim().is_empty() {
                continue;
            }
            let item = StreamFrame::parse(&payload)
                .map_err(|source| StreamError::Malformed { payload, source });
            self.pending.push_back(item);
        }
    }
}

/// Turn a byte stream into a stream of parsed frames.
///
/// A transport error is yielded once and ends the stream.
pub fn frame_stream<S>(bytes: S) -> FrameStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = FrameState {
        inner: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    let payloads = state.decoder.push(&chunk);
                    state.queue(payloads);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(StreamError::Transport(err)), state));
                }
                None => {
                    state.finished = true;
                    let tail = state.decoder.finish().into_iter().collect();
                    state.queue(tail);
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"heart").is_empty());
        assert!(decoder.push(b"beat\"}\n").is_empty());
        let events = decoder.push(b"\ndata: {\"logs\":[]}\r\n\r\n");
        assert_eq!(events, vec![r#"{"type":"heartbeat"}"#, r#"{"logs":[]}"#]);
    }

    #[test]
    fn comments_and_other_fields_are_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keep-alive\nevent: update\nid: 7\ndata: a\ndata: b\n\n");
        assert_eq!(events, vec!["a\nb"]);
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let mut decoder = SseDecoder::new();
        let payload = "data: {\"content\":\"caf\u{e9}\"}\n\n".as_bytes();
        let split = payload.iter().position(|b| *b >= 0x80).expect("multibyte") + 1;
        assert!(decoder.push(&payload[..split]).is_empty());
        let events = decoder.push(&payload[split..]);
        assert_eq!(events, vec!["{\"content\":\"caf\u{e9}\"}"]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"heartbeat\"}").is_empty());
        assert_eq!(
            decoder.finish().as_deref(),
            Some(r#"{"type":"heartbeat"}"#)
        );
        assert_eq!(decoder.finish(), None);
    }
}
