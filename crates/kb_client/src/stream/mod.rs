//! Incremental answer delivery over a chunked, newline-framed body.

pub mod decoder;
pub mod session;

pub use decoder::{DecoderState, Frame, FrameDecoder};
pub use session::{run_stream, Callbacks, StreamEnd, StreamHandler, StreamSummary};
