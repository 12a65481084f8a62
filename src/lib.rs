//! # topper-client
//!
//! Client that maintains TCP connections to a set of candidate servers,
//! measures round-trip latency to each via a lightweight ping protocol, and
//! exchanges application messages over a length-prefixed binary framing
//! format.
//!
//! ## Architecture
//!
//! - **Wire protocol** ([`protocol`]): `4-byte LE length || payload` frames;
//!   a length of 0 is the reserved ping/pong control frame.
//! - **Connection pool**: one socket per server address, each with a
//!   background read loop feeding a streaming frame decoder.
//! - **Latency prober**: zero-length probe frames with per-address
//!   outstanding-ping tracking and a timeout; successful round trips update
//!   the per-server registry.
//! - **Client façade** ([`Client`]): add/remove servers, probe sweeps, and
//!   dispatch of data frames from the active server to the application.
//!
//! Selection of the lowest-latency server and the outward message-send API
//! are policy hooks for a higher-level coordinator, not part of this crate.
//!
//! ## Example
//!
//! ```no_run
//! use topper_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder().build();
//!     client.add_server("example.com:9000")?;
//!     client.connect().await;
//!     Ok(())
//! }
//! ```

pub mod protocol;

mod address;
mod client;
mod config;
mod error;
mod pool;
mod probe;
mod registry;

pub use address::{ServerAddress, DEFAULT_PORT};
pub use client::{Client, ClientBuilder, EventHooks};
pub use config::{
    ClientConfig, SweepPolicy, DEFAULT_PING_TIMEOUT, DEFAULT_PROBE_INTERVAL,
    DEFAULT_READ_BUFFER_SIZE,
};
pub use error::{Result, TopperError};
pub use registry::ServerInfo;
