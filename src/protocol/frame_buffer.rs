//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `AwaitingLength`: need the 4-byte length prefix
//! - `AwaitingPayload`: prefix parsed, need N more payload bytes
//!
//! Chunk boundaries may fall anywhere, including inside the length prefix
//! itself; partial prefixes are buffered across pushes. Zero-length frames
//! complete immediately without consuming bytes of a following frame.
//!
//! # Example
//!
//! ```
//! use topper_client::protocol::{build_frame, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let bytes = build_frame(b"hello").unwrap();
//!
//! let frames = buffer.push(&bytes);
//! assert_eq!(frames.len(), 1);
//! assert_eq!(&frames[0].payload[..], b"hello");
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{bytes_to_length, LENGTH_SIZE};

/// One decoded frame.
///
/// An empty payload is the reserved ping/pong control frame; it never
/// represents an empty application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame from its payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Create a zero-length control frame.
    pub fn control() -> Self {
        Self {
            payload: Bytes::new(),
        }
    }

    /// Whether this is a ping/pong control frame.
    #[inline]
    pub fn is_control(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload length in bytes.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// Current parsing state.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete 4-byte length prefix.
    AwaitingLength,
    /// Prefix parsed, waiting for `expected` payload bytes.
    AwaitingPayload { expected: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
///
/// One instance per connection; partial-frame state belongs exclusively to
/// the read loop that owns it.
#[derive(Debug)]
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
}

impl FrameBuffer {
    /// Create a new frame buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::AwaitingLength,
        }
    }

    /// Push a chunk into the buffer and extract every complete frame.
    ///
    /// A push may produce zero, one, or many frames; leftover bytes stay
    /// buffered for the next push. Frames come out in arrival order.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();

        // Explicit loop rather than recursion: a chunk full of tiny frames
        // must not grow the stack.
        while let Some(frame) = self.try_extract_one() {
            frames.push(frame);
        }

        frames
    }

    /// Try to extract a single frame, returning `None` if more bytes are
    /// needed.
    fn try_extract_one(&mut self) -> Option<Frame> {
        match self.state {
            State::AwaitingLength => {
                if self.buffer.len() < LENGTH_SIZE {
                    return None;
                }

                let prefix = self.buffer.split_to(LENGTH_SIZE);
                let expected = bytes_to_length(&prefix)
                    .expect("prefix slice is exactly LENGTH_SIZE bytes")
                    as usize;

                if expected == 0 {
                    // Control frame, complete on its own.
                    return Some(Frame::control());
                }

                self.state = State::AwaitingPayload { expected };
                self.try_extract_one()
            }

            State::AwaitingPayload { expected } => {
                if self.buffer.len() < expected {
                    return None;
                }

                let payload = self.buffer.split_to(expected).freeze();
                self.state = State::AwaitingLength;

                Some(Frame::new(payload))
            }
        }
    }

    /// Discard all buffered bytes and partial-frame state.
    ///
    /// Used on connection teardown; never required between frames of the
    /// same stream.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::AwaitingLength;
    }

    /// Number of buffered, not-yet-consumed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no bytes are currently buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::AwaitingLength => "AwaitingLength",
            State::AwaitingPayload { .. } => "AwaitingPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
