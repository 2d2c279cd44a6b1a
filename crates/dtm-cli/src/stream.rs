//! Incremental decoding of the event stream.
//!
//! The service pushes EDN values over a long-lived response, framed as
//! server-sent events and interleaved with `:` heartbeat lines. Chunks arrive
//! at arbitrary byte boundaries, so the decoder buffers them and reports each
//! value exactly once, as soon as it is known to be complete.

use dtm_edn::{EdnError, Map, Value, parse, parse_prefix};

/// Consumed bytes are dropped from the front of the buffer past this size.
const COMPACT_THRESHOLD: usize = 4096;
const DATA_FIELD: &str = "data:";

/// A stretch of stream text that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StreamFailure {
    /// Reader diagnostic.
    pub(crate) message: String,
    /// The offending text.
    pub(crate) raw: String,
}

impl StreamFailure {
    /// The failure as a renderable `{:error … :raw …}` map.
    pub(crate) fn to_value(&self) -> Value {
        Value::Map(Map::from_entries(vec![
            (Value::keyword("error"), Value::string(self.message.as_str())),
            (Value::keyword("raw"), Value::string(self.raw.as_str())),
        ]))
    }
}

enum Step {
    Skip(usize),
    Decoded(Value, usize),
    Failed(String, usize),
    Wait,
}

/// Buffer plus the offset of the first byte not yet decoded.
#[derive(Debug)]
pub(crate) struct StreamDecoder {
    buffer: Vec<u8>,
    consumed: usize,
    line_start: bool,
    discarding: bool,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self {
            buffer: Vec::new(),
            consumed: 0,
            line_start: true,
            discarding: false,
        }
    }
}

impl StreamDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and reports every value it completes.
    pub(crate) fn push<F>(&mut self, chunk: &[u8], mut handler: F)
    where
        F: FnMut(Result<Value, StreamFailure>),
    {
        self.buffer.extend_from_slice(chunk);
        self.decode(&mut handler, false);
        if self.consumed > COMPACT_THRESHOLD {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
    }

    /// Flushes the buffer once the stream has ended.
    ///
    /// A trailing scalar with nothing after it is reported as a value; a
    /// value cut off mid-way is reported as one failure.
    pub(crate) fn finish<F>(&mut self, mut handler: F)
    where
        F: FnMut(Result<Value, StreamFailure>),
    {
        self.decode(&mut handler, true);
        self.buffer.clear();
        self.consumed = 0;
        self.line_start = true;
        self.discarding = false;
    }

    fn pending(&self) -> &[u8] {
        self.buffer.get(self.consumed..).unwrap_or_default()
    }

    fn advance(&mut self, length: usize) {
        if length == 0 {
            return;
        }
        self.line_start = self
            .pending()
            .get(length - 1)
            .is_some_and(|last| *last == b'\n');
        self.consumed += length;
    }

    /// Drops the remainder of a line whose start failed to decode.
    ///
    /// Returns `false` while the line's end has not arrived yet.
    fn skip_rest_of_line(&mut self) -> bool {
        let pending = self.pending();
        match pending.iter().position(|byte| *byte == b'\n') {
            Some(position) => {
                self.discarding = false;
                self.advance(position);
                true
            }
            None => {
                let length = pending.len();
                self.advance(length);
                false
            }
        }
    }

    fn decode<F>(&mut self, handler: &mut F, flushing: bool)
    where
        F: FnMut(Result<Value, StreamFailure>),
    {
        loop {
            if self.discarding && !self.skip_rest_of_line() {
                return;
            }
            let pending = self.pending();
            let step = match decodable_text(pending) {
                Ok((text, blocked)) => next_step(text, flushing || blocked, self.line_start),
                Err(message) => Step::Failed(message, line_end(pending, 0)),
            };
            match step {
                Step::Skip(length) => self.advance(length),
                Step::Decoded(value, length) => {
                    self.advance(length);
                    handler(Ok(value));
                }
                Step::Failed(message, length) => {
                    let raw = self
                        .pending()
                        .get(..length)
                        .map(|fragment| String::from_utf8_lossy(fragment).trim().to_owned())
                        .unwrap_or_default();
                    tracing::debug!(%message, %raw, "skipping undecodable stream text");
                    self.advance(length);
                    self.discarding = !flushing && self.pending().is_empty();
                    handler(Err(StreamFailure { message, raw }));
                }
                Step::Wait => return,
            }
        }
    }
}

/// The longest valid UTF-8 prefix of `bytes`, and whether an invalid
/// sequence follows it.
///
/// A multi-byte character split across chunks is left for the next push.
fn decodable_text(bytes: &[u8]) -> Result<(&str, bool), String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok((text, false)),
        Err(error) => {
            let valid = bytes
                .get(..error.valid_up_to())
                .and_then(|prefix| std::str::from_utf8(prefix).ok())
                .unwrap_or_default();
            match error.error_len() {
                None => Ok((valid, false)),
                Some(_) if valid.is_empty() => Err(error.to_string()),
                Some(_) => Ok((valid, true)),
            }
        }
    }
}

/// Length of the fragment from the start of `bytes` up to the first newline
/// at or after `from`, or all of `bytes` when no newline has arrived yet.
fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes
        .get(from..)
        .and_then(|rest| rest.iter().position(|byte| *byte == b'\n'))
        .map_or(bytes.len(), |position| from + position)
        .max(1)
}

fn next_step(text: &str, flushing: bool, line_start: bool) -> Step {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return Step::Wait;
    };

    if is_separator(first) {
        let length = text
            .find(|current: char| !is_separator(current))
            .unwrap_or(text.len());
        return Step::Skip(length);
    }

    if first == ':' {
        if line_start {
            return comment_line(text, flushing);
        }
        match chars.next() {
            None if flushing => return Step::Skip(1),
            None => return Step::Wait,
            Some(next) if next == ':' || next.is_whitespace() => return Step::Skip(1),
            Some(_) => {}
        }
    }

    if let Some(payload) = text.strip_prefix(DATA_FIELD) {
        let space = usize::from(payload.starts_with(' '));
        return Step::Skip(DATA_FIELD.len() + space);
    }
    if !flushing && DATA_FIELD.starts_with(text) {
        return Step::Wait;
    }

    read_value(text, flushing)
}

/// A line opening with `:` is an event-stream comment, such as a heartbeat
/// or `: keep-alive`, and is skipped whole.
///
/// Heartbeat colons running straight into a `data:` field are dropped on
/// their own so the field still decodes.
fn comment_line(text: &str, flushing: bool) -> Step {
    let colons = text.find(|current: char| current != ':').unwrap_or(text.len());
    let rest = text.get(colons..).unwrap_or_default();
    if rest.starts_with(DATA_FIELD) {
        return Step::Skip(colons);
    }
    if let Some(newline) = text.find('\n') {
        return Step::Skip(newline + 1);
    }
    if flushing {
        Step::Skip(text.len())
    } else {
        Step::Wait
    }
}

fn read_value(text: &str, flushing: bool) -> Step {
    let failed = |error: EdnError| {
        let length = line_end(text.as_bytes(), error.offset().unwrap_or_default());
        Step::Failed(error.to_string(), length)
    };
    match parse_prefix(text) {
        Ok((value, end)) => Step::Decoded(value, end),
        Err(EdnError::Empty) if flushing => Step::Skip(text.len()),
        Err(error) if error.is_incomplete() && !flushing => Step::Wait,
        Err(error) if error.is_incomplete() => match parse(text) {
            Ok(value) => Step::Decoded(value, text.len()),
            Err(complete) => Step::Failed(complete.to_string(), text.len()),
        },
        Err(error) => failed(error),
    }
}

fn is_separator(current: char) -> bool {
    current.is_whitespace() || current == ','
}
