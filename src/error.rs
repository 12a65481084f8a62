//! Error types for topper-client.

use thiserror::Error;

use crate::address::ServerAddress;

/// Main error type for all client operations.
///
/// Transient network outcomes (ping timeout, stream end, late pong) are not
/// errors; they surface only through state. The variants here are contract
/// or input violations plus plain I/O failures.
#[derive(Debug, Error)]
pub enum TopperError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The port segment of a textual address could not be parsed.
    #[error("cannot parse port part of address \"{address}\"")]
    MalformedAddress {
        /// The full address text as given.
        address: String,
    },

    /// Payload exceeds the 4-byte length prefix range.
    #[error("message is too large: the maximum number of bytes is 4294967295, but {length} bytes were given")]
    MessageTooLarge {
        /// Length of the rejected payload.
        length: u64,
    },

    /// A length prefix was parsed from something other than exactly 4 bytes.
    ///
    /// Internal invariant; never triggers from well-formed feeding.
    #[error("cannot parse a length from {length} bytes, expected exactly 4")]
    InvalidLengthEncoding {
        /// Number of bytes actually given.
        length: usize,
    },

    /// Send attempted without an established connection.
    ///
    /// Callers must `ensure_connection` first; this is a programming-contract
    /// violation, not a recoverable runtime condition.
    #[error("no connection exists for server \"{0}\"")]
    NoConnection(ServerAddress),

    /// Lookup of a server address that was never registered.
    #[error("no server exists for address \"{0}\"")]
    UnknownServer(ServerAddress),
}

/// Result type alias using TopperError.
pub type Result<T> = std::result::Result<T, TopperError>;
