//! Server address parsing.
//!
//! Addresses are given as `"host"` or `"host:port"`. A missing or empty port
//! segment falls back to [`DEFAULT_PORT`]. The parsed [`ServerAddress`] is
//! the key for every per-server map in the crate.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TopperError};

/// Port used when the textual address carries no port segment.
pub const DEFAULT_PORT: u16 = 7459;

/// A `(host, port)` pair identifying one candidate server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Create an address from explicit parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Hostname or IP literal.
    #[inline]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for ServerAddress {
    type Err = TopperError;

    /// Parse `"host"` or `"host:port"`.
    ///
    /// # Example
    ///
    /// ```
    /// use topper_client::ServerAddress;
    ///
    /// let addr: ServerAddress = "example.com:9000".parse().unwrap();
    /// assert_eq!(addr.host(), "example.com");
    /// assert_eq!(addr.port(), 9000);
    ///
    /// let addr: ServerAddress = "example.com".parse().unwrap();
    /// assert_eq!(addr.port(), 7459);
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        let (host, port_raw) = match s.split_once(':') {
            Some((host, port_raw)) => (host, Some(port_raw)),
            None => (s, None),
        };

        let port = match port_raw {
            // "host:" is treated the same as a missing port
            None | Some("") => DEFAULT_PORT,
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| TopperError::MalformedAddress {
                    address: s.to_string(),
                })?,
        };

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
