//! Decoding of the server's newline-delimited JSON token stream

use super::types::{LlmError, TextStream};
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

/// One decoded line of the stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Text to relay
    Text(String),
    /// Server marked the generation complete
    Done,
    /// Nothing to relay
    Skip,
}

/// Interpret a single line of the stream
///
/// JSON lines carry their text in `response`, `output` or `text`; a line with
/// `done: true` ends the stream. Anything that is not JSON is relayed as is.
pub fn parse_line(line: &str) -> StreamEvent {
    if line.trim().is_empty() {
        return StreamEvent::Skip;
    }

    match serde_json::from_str::<Value>(line) {
        Ok(json) => {
            if json.get("done").and_then(Value::as_bool).unwrap_or(false) {
                return StreamEvent::Done;
            }
            let chunk = ["response", "output", "text"]
                .iter()
                .filter_map(|key| json.get(*key).and_then(Value::as_str))
                .find(|s| !s.is_empty());
            match chunk {
                Some(text) => StreamEvent::Text(text.to_string()),
                None => StreamEvent::Skip,
            }
        }
        Err(_) => StreamEvent::Text(line.to_string()),
    }
}

/// Splits arbitrary byte chunks into complete lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(
                String::from_utf8_lossy(&line[..line.len() - 1])
                    .trim_end_matches('\r')
                    .to_string(),
            );
        }
        lines
    }

    /// Flush a trailing line without newline
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).to_string())
    }
}

struct DecodeState<S> {
    body: S,
    decoder: LineDecoder,
    pending: VecDeque<String>,
    done: bool,
    idle: Duration,
}

impl<S> DecodeState<S> {
    fn absorb(&mut self, line: &str) {
        if self.done {
            return;
        }
        match parse_line(line) {
            StreamEvent::Text(text) => self.pending.push_back(text),
            StreamEvent::Done => self.done = true,
            StreamEvent::Skip => {}
        }
    }
}

/// Turn a raw byte stream into a stream of text chunks
///
/// Each read must make progress within `idle`, otherwise the stream yields a
/// timeout error and ends.
pub fn decode_ndjson<S, B, E>(body: S, idle: Duration) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        body,
        decoder: LineDecoder::new(),
        pending: VecDeque::new(),
        done: false,
        idle,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.pending.pop_front() {
                return Some((Ok(text), st));
            }
            if st.done {
                return None;
            }

            match tokio::time::timeout(st.idle, st.body.next()).await {
                Err(_) => {
                    st.done = true;
                    let elapsed = st.idle;
                    return Some((Err(LlmError::timeout(elapsed)), st));
                }
                Ok(Some(Ok(bytes))) => {
                    for line in st.decoder.push(bytes.as_ref()) {
                        st.absorb(&line);
                    }
                }
                Ok(Some(Err(e))) => {
                    st.done = true;
                    let err = LlmError::network(format!("stream interrupted: {}", e));
                    return Some((Err(err), st));
                }
                Ok(None) => {
                    if let Some(line) = st.decoder.finish() {
                        st.absorb(&line);
                    }
                    st.done = true;
                }
            }
        }
    }))
}
