//! Server registry - per-address latency and connection bookkeeping.
//!
//! Pure state, no network I/O. The registry is owned by the client aggregate
//! and keyed by [`ServerAddress`]; a connection may only exist for an address
//! currently registered here.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use crate::address::ServerAddress;
use crate::error::{Result, TopperError};

/// Latency and connection metadata for one registered server.
///
/// All fields are absent at registration. `last_ping_at` and `ping` update
/// on every successful ping; `connected_since` is set only while the address
/// is the active connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    /// Wall-clock time of the last successful ping.
    pub last_ping_at: Option<SystemTime>,
    /// Round-trip time measured by the last successful ping.
    pub ping: Option<Duration>,
    /// When this address became the active connection, if it is.
    pub connected_since: Option<SystemTime>,
}

/// Registry of candidate servers.
#[derive(Debug, Default)]
pub struct Registry {
    servers: Mutex<HashMap<ServerAddress, ServerInfo>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server with a fresh, all-absent record.
    ///
    /// Re-adding an existing address overwrites its record, resetting stats.
    pub fn add(&self, address: ServerAddress) {
        self.servers
            .lock()
            .expect("registry lock poisoned")
            .insert(address, ServerInfo::default());
    }

    /// Deregister a server, destroying its record.
    ///
    /// Returns whether the address was registered.
    pub fn remove(&self, address: &ServerAddress) -> bool {
        self.servers
            .lock()
            .expect("registry lock poisoned")
            .remove(address)
            .is_some()
    }

    /// Whether the address is currently registered.
    pub fn contains(&self, address: &ServerAddress) -> bool {
        self.servers
            .lock()
            .expect("registry lock poisoned")
            .contains_key(address)
    }

    /// Snapshot of all registered addresses.
    pub fn addresses(&self) -> Vec<ServerAddress> {
        self.servers
            .lock()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Look up the record for an address.
    ///
    /// Fails with [`TopperError::UnknownServer`] if it was never added.
    pub fn get(&self, address: &ServerAddress) -> Result<ServerInfo> {
        self.servers
            .lock()
            .expect("registry lock poisoned")
            .get(address)
            .cloned()
            .ok_or_else(|| TopperError::UnknownServer(address.clone()))
    }

    /// Record a successful ping, preserving any `connected_since`.
    ///
    /// No-op if the server was deregistered while the ping was in flight; a
    /// completion must not resurrect a removed record.
    pub fn record_ping(&self, address: &ServerAddress, at: SystemTime, round_trip: Duration) {
        let mut servers = self.servers.lock().expect("registry lock poisoned");

        if let Some(info) = servers.get_mut(address) {
            info.last_ping_at = Some(at);
            info.ping = Some(round_trip);
        }
    }

    /// Mark an address as the active connection.
    pub fn mark_connected(&self, address: &ServerAddress, since: SystemTime) {
        let mut servers = self.servers.lock().expect("registry lock poisoned");

        if let Some(info) = servers.get_mut(address) {
            info.connected_since = Some(since);
        }
    }

    /// Clear an address's active-connection timestamp.
    pub fn clear_connected(&self, address: &ServerAddress) {
        let mut servers = self.servers.lock().expect("registry lock poisoned");

        if let Some(info) = servers.get_mut(address) {
            info.connected_since = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> ServerAddress {
        ServerAddress::new("example.com", port)
    }

    #[test]
    fn test_add_creates_all_absent_record() {
        let registry = Registry::new();
        registry.add(addr(1));

        let info = registry.get(&addr(1)).unwrap();
        assert_eq!(info, ServerInfo::default());
    }

    #[test]
    fn test_get_unknown_server_fails() {
        let registry = Registry::new();

        let result = registry.get(&addr(1));
        assert!(matches!(result, Err(TopperError::UnknownServer(a)) if a == addr(1)));
    }

    #[test]
    fn test_remove_destroys_record() {
        let registry = Registry::new();
        registry.add(addr(1));

        assert!(registry.remove(&addr(1)));
        assert!(!registry.remove(&addr(1)));
        assert!(registry.get(&addr(1)).is_err());
    }

    #[test]
    fn test_re_add_resets_stats() {
        let registry = Registry::new();
        registry.add(addr(1));
        registry.record_ping(&addr(1), SystemTime::now(), Duration::from_millis(12));

        registry.add(addr(1));

        let info = registry.get(&addr(1)).unwrap();
        assert!(info.ping.is_none());
        assert!(info.last_ping_at.is_none());
    }

    #[test]
    fn test_record_ping_preserves_connected_since() {
        let registry = Registry::new();
        registry.add(addr(1));

        let since = SystemTime::now();
        registry.mark_connected(&addr(1), since);
        registry.record_ping(&addr(1), SystemTime::now(), Duration::from_millis(3));

        let info = registry.get(&addr(1)).unwrap();
        assert_eq!(info.connected_since, Some(since));
        assert_eq!(info.ping, Some(Duration::from_millis(3)));
    }

    #[test]
    fn test_record_ping_after_removal_is_noop() {
        let registry = Registry::new();
        registry.add(addr(1));
        registry.remove(&addr(1));

        registry.record_ping(&addr(1), SystemTime::now(), Duration::from_millis(3));

        assert!(registry.get(&addr(1)).is_err());
    }

    #[test]
    fn test_clear_connected() {
        let registry = Registry::new();
        registry.add(addr(1));
        registry.mark_connected(&addr(1), SystemTime::now());

        registry.clear_connected(&addr(1));

        let info = registry.get(&addr(1)).unwrap();
        assert!(info.connected_since.is_none());
    }

    #[test]
    fn test_addresses_snapshot() {
        let registry = Registry::new();
        registry.add(addr(1));
        registry.add(addr(2));

        let mut addresses = registry.addresses();
        addresses.sort_by_key(ServerAddress::port);

        assert_eq!(addresses, vec![addr(1), addr(2)]);
    }
}
