//! Line-framed decoding of the answer stream.
//!
//! Bytes arrive in arbitrary chunks. A code point split across two chunks is
//! held back until its remaining bytes arrive, and a line without its `\n`
//! is held back until the next chunk (or the end of the transport).

use crate::error::StreamError;

const DATA_PREFIX: &str = "data:";
const EVENT_PREFIX: &str = "event:";

/// Longest unterminated line the decoder will hold.
pub const MAX_LINE_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload of one `data:` line, verbatim.
    Token(String),
    /// `event:complete`.
    Complete,
    /// The `data:` line following an `event:error`.
    ServerError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Open,
    Closed,
    Errored,
}

#[derive(Debug)]
pub struct FrameDecoder {
    /// Undecoded tail: at most the leading bytes of one code point.
    pending: Vec<u8>,
    /// Decoded text of the current, unterminated line.
    line: String,
    /// Bytes decoded so far, for error offsets.
    consumed: usize,
    state: DecoderState,
    error_armed: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            line: String::new(),
            consumed: 0,
            state: DecoderState::Open,
            error_armed: false,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Decodes one transport chunk into the frames it completes. Once the
    /// decoder has left `Open`, further input is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, StreamError> {
        if self.state != DecoderState::Open {
            return Ok(Vec::new());
        }
        self.pending.extend_from_slice(chunk);
        // Text carried over from earlier chunks holds no newline.
        let scanned = self.line.len();
        self.decode_pending()?;

        let Some(last_newline) = self.line[scanned..].rfind('\n').map(|i| scanned + i) else {
            if self.line.len() > MAX_LINE_BYTES {
                self.state = DecoderState::Errored;
                self.discard();
                return Err(StreamError::LineTooLong {
                    limit: MAX_LINE_BYTES,
                });
            }
            return Ok(Vec::new());
        };
        let rest = self.line.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.line, rest);

        let mut frames = Vec::new();
        for raw in complete.split_terminator('\n') {
            if let Some(frame) = self.parse_line(raw) {
                frames.push(frame);
            }
            if self.state != DecoderState::Open {
                self.discard();
                break;
            }
        }
        Ok(frames)
    }

    /// Called at the end of the transport. An unterminated last line counts
    /// as a line; a code point still missing bytes is malformed input.
    pub fn finish(&mut self) -> Result<Vec<Frame>, StreamError> {
        if self.state != DecoderState::Open {
            return Ok(Vec::new());
        }
        if !self.pending.is_empty() {
            self.state = DecoderState::Errored;
            return Err(StreamError::InvalidUtf8 {
                offset: self.consumed,
            });
        }
        let last = std::mem::take(&mut self.line);
        let frame = self.parse_line(&last);
        if self.state == DecoderState::Open {
            self.state = DecoderState::Closed;
        }
        Ok(frame.into_iter().collect())
    }

    fn decode_pending(&mut self) -> Result<(), StreamError> {
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                self.line.push_str(text);
                self.consumed += self.pending.len();
                self.pending.clear();
                return Ok(());
            }
            Err(err) if err.error_len().is_some() => {
                self.state = DecoderState::Errored;
                self.discard();
                return Err(StreamError::InvalidUtf8 {
                    offset: self.consumed + err.valid_up_to(),
                });
            }
            Err(err) => err.valid_up_to(),
        };
        // The prefix up to `valid` was just validated.
        if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
            self.line.push_str(text);
        }
        self.consumed += valid;
        self.pending.drain(..valid);
        Ok(())
    }

    fn parse_line(&mut self, raw: &str) -> Option<Frame> {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
            if self.error_armed {
                self.error_armed = false;
                self.state = DecoderState::Errored;
                return Some(Frame::ServerError(payload.to_string()));
            }
            return Some(Frame::Token(payload.to_string()));
        }
        match line.strip_prefix(EVENT_PREFIX).map(str::trim) {
            Some("complete") => {
                self.state = DecoderState::Closed;
                Some(Frame::Complete)
            }
            Some("error") => {
                self.error_armed = true;
                None
            }
            _ => None,
        }
    }

    fn discard(&mut self) {
        self.pending.clear();
        self.line.clear();
    }
}
