//! Client configuration.

use std::time::Duration;

/// Default time to wait for a pong before giving up on a ping.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between periodic probe sweeps.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(60);

/// Default read-loop buffer size (64 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// How a probe sweep schedules its pings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepPolicy {
    /// Ping each server to completion before starting the next.
    ///
    /// Bounds the sweep at one outstanding probe connection at a time, at
    /// the cost of total sweep latency.
    #[default]
    Sequential,
    /// Ping all servers at once and await them together.
    Concurrent,
}

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Time to wait for a pong before treating a ping as timed out.
    pub ping_timeout: Duration,
    /// Interval between periodic probe sweeps once the client has started.
    pub probe_interval: Duration,
    /// Scheduling policy for probe sweeps.
    pub sweep_policy: SweepPolicy,
    /// Size of the per-connection read buffer.
    pub read_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ping_timeout: DEFAULT_PING_TIMEOUT,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            sweep_policy: SweepPolicy::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}
