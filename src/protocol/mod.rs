//! Protocol module - wire format and streaming frame decoding.
//!
//! The wire format is a 4-byte little-endian length prefix followed by that
//! many payload bytes. A length of 0 is reserved as the ping/pong control
//! frame and never represents an empty application message.

mod frame_buffer;
mod wire_format;

pub use frame_buffer::{Frame, FrameBuffer};
pub use wire_format::{
    build_frame, bytes_to_length, length_to_bytes, ping_frame, LENGTH_SIZE, MAX_PAYLOAD_LEN,
};
