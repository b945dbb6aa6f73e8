use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use super::decoder::{Frame, FrameDecoder};
use crate::error::{StreamError, TransportError};

/// Receives the events of one streaming answer. After `on_complete` or
/// `on_error` nothing else is called.
pub trait StreamHandler: Send {
    fn on_token(&mut self, token: &str);

    fn on_complete(&mut self, _answer: &str) {}

    fn on_error(&mut self, _error: &StreamError) {}
}

type TokenFn = Box<dyn FnMut(&str) + Send>;
type ErrorFn = Box<dyn FnMut(&StreamError) + Send>;

/// Closure-backed [`StreamHandler`].
#[derive(Default)]
pub struct Callbacks {
    token: Option<TokenFn>,
    complete: Option<TokenFn>,
    error: Option<ErrorFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_token(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.token = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.complete = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&StreamError) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl StreamHandler for Callbacks {
    fn on_token(&mut self, token: &str) {
        if let Some(f) = self.token.as_mut() {
            f(token);
        }
    }

    fn on_complete(&mut self, answer: &str) {
        if let Some(f) = self.complete.as_mut() {
            f(answer);
        }
    }

    fn on_error(&mut self, error: &StreamError) {
        if let Some(f) = self.error.as_mut() {
            f(error);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The completion event arrived.
    Completed,
    /// The transport ended without a completion event.
    Closed,
    /// A transport, decoding or server error was delivered to `on_error`.
    Errored,
    /// The caller cancelled; no callback fired for the remainder.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub answer: String,
    pub tokens: usize,
    pub end: StreamEnd,
}

/// Drives `body` through a [`FrameDecoder`] until completion, error, end of
/// transport or cancellation. Dropping the body releases the connection.
pub async fn run_stream<S>(
    mut body: S,
    handler: &mut dyn StreamHandler,
    cancel: &CancellationToken,
) -> StreamSummary
where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut answer = String::new();
    let mut tokens = 0usize;

    let end = 'read: loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Stream cancelled after {} tokens", tokens);
                break 'read StreamEnd::Cancelled;
            }
            next = body.next() => next,
        };
        let transport_ended = next.is_none();
        let decoded = match next {
            Some(Ok(chunk)) => decoder.feed(&chunk),
            Some(Err(err)) => Err(StreamError::Transport(err)),
            None => decoder.finish(),
        };
        let frames = match decoded {
            Ok(frames) => frames,
            Err(err) => {
                warn!("Stream failed after {} tokens: {}", tokens, err);
                handler.on_error(&err);
                break StreamEnd::Errored;
            }
        };
        for frame in frames {
            match frame {
                Frame::Token(token) => {
                    tokens += 1;
                    answer.push_str(&token);
                    handler.on_token(&token);
                }
                Frame::Complete => {
                    handler.on_complete(&answer);
                    break 'read StreamEnd::Completed;
                }
                Frame::ServerError(message) => {
                    warn!("Server reported stream error: {}", message);
                    handler.on_error(&StreamError::Server(message));
                    break 'read StreamEnd::Errored;
                }
            }
        }
        if transport_ended {
            debug!("Stream closed by transport after {} tokens", tokens);
            break StreamEnd::Closed;
        }
    };

    StreamSummary {
        answer,
        tokens,
        end,
    }
}
