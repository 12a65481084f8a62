//! Wire format encoding and decoding.
//!
//! Each frame on the wire is:
//! ```text
//! ┌────────────┬──────────────┐
//! │ Length     │ Payload      │
//! │ 4 bytes LE │ Length bytes │
//! └────────────┴──────────────┘
//! ```
//!
//! A length of 0 is the reserved ping/pong control value and carries no
//! payload bytes.

use crate::error::{Result, TopperError};

/// Length prefix size in bytes (fixed, exactly 4).
pub const LENGTH_SIZE: usize = 4;

/// Maximum payload length representable by the 4-byte prefix.
pub const MAX_PAYLOAD_LEN: u64 = u32::MAX as u64;

/// Encode a payload length as the 4-byte little-endian prefix.
///
/// Fails with [`TopperError::MessageTooLarge`] past [`MAX_PAYLOAD_LEN`];
/// nothing is emitted on failure.
pub fn length_to_bytes(length: u64) -> Result<[u8; LENGTH_SIZE]> {
    if length > MAX_PAYLOAD_LEN {
        return Err(TopperError::MessageTooLarge { length });
    }

    Ok((length as u32).to_le_bytes())
}

/// Parse a 4-byte little-endian length prefix.
///
/// Fails with [`TopperError::InvalidLengthEncoding`] if given anything other
/// than exactly 4 bytes.
///
/// # Example
///
/// ```
/// use topper_client::protocol::bytes_to_length;
///
/// assert_eq!(bytes_to_length(&[5, 0, 0, 0]).unwrap(), 5);
/// assert!(bytes_to_length(&[5, 0, 0]).is_err());
/// ```
pub fn bytes_to_length(bytes: &[u8]) -> Result<u32> {
    let prefix: [u8; LENGTH_SIZE] =
        bytes
            .try_into()
            .map_err(|_| TopperError::InvalidLengthEncoding {
                length: bytes.len(),
            })?;

    Ok(u32::from_le_bytes(prefix))
}

/// Build a complete frame: length prefix followed by the payload.
///
/// # Example
///
/// ```
/// use topper_client::protocol::build_frame;
///
/// let bytes = build_frame(b"hello").unwrap();
/// assert_eq!(bytes, [5, 0, 0, 0, b'h', b'e', b'l', b'l', b'o']);
/// ```
pub fn build_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let prefix = length_to_bytes(payload.len() as u64)?;

    let mut buf = Vec::with_capacity(LENGTH_SIZE + payload.len());
    buf.extend_from_slice(&prefix);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// The encoded zero-length control frame used for ping and pong.
#[inline]
pub fn ping_frame() -> [u8; LENGTH_SIZE] {
    [0; LENGTH_SIZE]
}
