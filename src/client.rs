//! Client façade and latency prober.
//!
//! The [`Client`] composes the registry, connection pool, and ping tracker
//! into one aggregate: register candidate servers, probe them for latency
//! over the zero-length control-frame convention, and forward data frames
//! from the active server to the application via [`EventHooks`].
//!
//! Selecting the lowest-latency server and sending application messages are
//! policy left to an external coordinator; [`Client::set_active_server`] is
//! the hook it drives.
//!
//! # Example
//!
//! ```no_run
//! use topper_client::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder().build();
//!
//!     client.add_server("example.com:9000")?;
//!     client.add_server("fallback.example.com")?; // port defaults to 7459
//!
//!     // One full probe sweep, then periodic sweeps in the background.
//!     client.connect().await;
//!
//!     for address in client.get_servers() {
//!         let info = client.get_server_info(&address)?;
//!         println!("{address}: {:?}", info.ping);
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant, SystemTime};

use bytes::Bytes;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;

use crate::address::ServerAddress;
use crate::config::{ClientConfig, SweepPolicy};
use crate::error::Result;
use crate::pool::{ConnectionPool, FrameHandler};
use crate::probe::PingTracker;
use crate::protocol::ping_frame;
use crate::registry::{Registry, ServerInfo};

/// Outward event hooks invoked by the client.
///
/// All methods default to no-ops; implement the ones you need. Hooks are
/// called synchronously from the client's tasks and must not block.
pub trait EventHooks: Send + Sync + 'static {
    /// The active connection appeared or disappeared.
    fn on_connectivity_change(&self) {}

    /// The active server designation changed.
    fn on_server_changed(&self) {}

    /// A data frame arrived from the active server.
    ///
    /// Never called for control frames or for frames from non-active
    /// servers.
    fn on_message_received(&self, payload: Bytes) {
        let _ = payload;
    }
}

/// Default hooks that ignore every event.
struct NoopHooks;

impl EventHooks for NoopHooks {}

/// Builder for configuring and creating a [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    hooks: Arc<dyn EventHooks>,
}

impl ClientBuilder {
    /// Create a builder with default configuration and no-op hooks.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            hooks: Arc::new(NoopHooks),
        }
    }

    /// Install the application's event hooks.
    pub fn hooks(mut self, hooks: impl EventHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Set how long a ping waits for its pong.
    ///
    /// Default: 60 seconds.
    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.config.ping_timeout = timeout;
        self
    }

    /// Set the interval between periodic probe sweeps.
    ///
    /// Default: 60 seconds.
    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.config.probe_interval = interval;
        self
    }

    /// Set the probe sweep scheduling policy.
    ///
    /// Default: [`SweepPolicy::Sequential`].
    pub fn sweep_policy(mut self, policy: SweepPolicy) -> Self {
        self.config.sweep_policy = policy;
        self
    }

    /// Set the per-connection read buffer size.
    ///
    /// Default: 64 KiB.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        let ClientBuilder { config, hooks } = self;
        let read_buffer_size = config.read_buffer_size;

        let inner = Arc::new_cyclic(|weak: &Weak<ClientInner>| {
            let weak = weak.clone();
            let on_frame: FrameHandler = Arc::new(move |address, payload| {
                if let Some(inner) = weak.upgrade() {
                    inner.dispatch(address, payload);
                }
            });

            ClientInner {
                config,
                registry: Registry::new(),
                tracker: PingTracker::new(),
                pool: ConnectionPool::new(on_frame, read_buffer_size),
                hooks,
                active: Mutex::new(None),
                driver: Mutex::new(None),
            }
        });

        Client { inner }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state behind the cheaply-cloneable [`Client`] handle.
struct ClientInner {
    config: ClientConfig,
    registry: Registry,
    tracker: PingTracker,
    pool: ConnectionPool,
    hooks: Arc<dyn EventHooks>,
    /// The address designated as the active connection, if any.
    active: Mutex<Option<ServerAddress>>,
    /// Handle of the periodic sweep driver, once started.
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl ClientInner {
    /// Route one decoded frame: pongs to the tracker, data frames to the
    /// application if they came from the active server.
    fn dispatch(&self, address: &ServerAddress, payload: Bytes) {
        if payload.is_empty() {
            if !self.tracker.resolve(address) {
                tracing::trace!(server = %address, "unmatched pong discarded");
            }
            return;
        }

        let from_active = self.active.lock().expect("active lock poisoned").as_ref() == Some(address);
        if !from_active {
            tracing::trace!(server = %address, "frame from non-active server discarded");
            return;
        }

        self.hooks.on_message_received(payload);
    }
}

/// Client that probes a set of candidate servers for latency and exchanges
/// length-prefixed messages with the active one.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Register a candidate server given as `"host"` or `"host:port"`.
    ///
    /// Re-adding an address resets its recorded stats. Fails with
    /// [`TopperError::MalformedAddress`](crate::TopperError::MalformedAddress)
    /// on an unparseable port segment.
    pub fn add_server(&self, address: &str) -> Result<ServerAddress> {
        let address: ServerAddress = address.parse()?;
        self.inner.registry.add(address.clone());
        Ok(address)
    }

    /// Deregister a server, closing any open connection to it first.
    pub fn remove_server(&self, address: &ServerAddress) {
        self.close_connection(address);
        self.inner.registry.remove(address);
    }

    /// Snapshot of all registered server addresses.
    pub fn get_servers(&self) -> Vec<ServerAddress> {
        self.inner.registry.addresses()
    }

    /// Latency and connection metadata for a registered server.
    ///
    /// Fails with
    /// [`TopperError::UnknownServer`](crate::TopperError::UnknownServer) if
    /// the address was never added.
    pub fn get_server_info(&self, address: &ServerAddress) -> Result<ServerInfo> {
        self.inner.registry.get(address)
    }

    /// The address currently designated as the active connection.
    pub fn get_connected_server(&self) -> Option<ServerAddress> {
        self.inner
            .active
            .lock()
            .expect("active lock poisoned")
            .clone()
    }

    /// Run one full probe sweep, then start the periodic sweep driver.
    pub async fn connect(&self) {
        self.ping_all_servers().await;

        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.config.probe_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; the initial sweep already ran.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { return };
                Client { inner }.ping_all_servers().await;
            }
        });

        let mut driver = self.inner.driver.lock().expect("driver lock poisoned");
        if let Some(old) = driver.replace(handle) {
            old.abort();
        }
    }

    /// Tear the client down: stop the periodic driver, close every
    /// connection, drop outstanding pings, and clear the active server.
    pub fn disconnect(&self) {
        if let Some(driver) = self
            .inner
            .driver
            .lock()
            .expect("driver lock poisoned")
            .take()
        {
            driver.abort();
        }

        self.inner.pool.close_all();
        self.inner.tracker.clear();
        self.set_active_server(None);
    }

    /// Ping every registered server according to the configured
    /// [`SweepPolicy`].
    ///
    /// Individual ping failures are logged and do not stop the sweep.
    pub async fn ping_all_servers(&self) {
        let addresses = self.inner.registry.addresses();
        tracing::debug!(servers = addresses.len(), "probe sweep started");

        match self.inner.config.sweep_policy {
            SweepPolicy::Sequential => {
                for address in addresses {
                    if let Err(e) = self.ping(&address).await {
                        tracing::warn!(server = %address, error = %e, "ping failed");
                    }
                }
            }
            SweepPolicy::Concurrent => {
                let mut pings = JoinSet::new();

                for address in addresses {
                    let client = self.clone();
                    pings.spawn(async move {
                        if let Err(e) = client.ping(&address).await {
                            tracing::warn!(server = %address, error = %e, "ping failed");
                        }
                    });
                }

                while pings.join_next().await.is_some() {}
            }
        }
    }

    /// Measure round-trip latency to one server.
    ///
    /// Opens a connection if none exists, sends a zero-length control frame,
    /// and waits for the matching pong up to the configured ping timeout.
    /// Success updates the server's registry record; a timeout leaves it
    /// untouched and is a normal outcome, not an error. Unless the address
    /// is the active server, the probe connection is closed afterwards.
    ///
    /// Errors are contract or I/O failures only (connect refused, send on a
    /// broken socket, ...).
    pub async fn ping(&self, address: &ServerAddress) -> Result<()> {
        self.inner.pool.ensure_connection(address).await?;
        self.ping_connection(address).await?;

        let is_active = self.get_connected_server().as_ref() == Some(address);
        if !is_active {
            self.close_connection(address);
        }

        Ok(())
    }

    /// Ping over an already-established connection.
    async fn ping_connection(&self, address: &ServerAddress) -> Result<()> {
        let start = Instant::now();
        let pong = self.inner.tracker.register(address);

        if let Err(e) = self.inner.pool.send(address, &ping_frame()).await {
            self.inner.tracker.forget(address);
            return Err(e);
        }

        match timeout(self.inner.config.ping_timeout, pong).await {
            Ok(Ok(())) => {
                let round_trip = start.elapsed();
                self.inner
                    .registry
                    .record_ping(address, SystemTime::now(), round_trip);
                tracing::debug!(
                    server = %address,
                    round_trip_ms = round_trip.as_millis() as u64,
                    "ping succeeded"
                );
            }
            // Tracker entry dropped under us, e.g. the connection closed
            // while waiting. No registry update.
            Ok(Err(_)) => {
                tracing::debug!(server = %address, "ping abandoned");
            }
            Err(_) => {
                self.inner.tracker.forget(address);
                tracing::debug!(server = %address, "ping timed out");
            }
        }

        Ok(())
    }

    /// Designate the active server, or clear it with `None`.
    ///
    /// Policy hook for the external lowest-latency coordinator. Maintains
    /// `connected_since` on the affected registry records and fires
    /// [`EventHooks::on_server_changed`] and, when the active connection
    /// appears or disappears, [`EventHooks::on_connectivity_change`].
    pub fn set_active_server(&self, address: Option<ServerAddress>) {
        let previous = {
            let mut active = self.inner.active.lock().expect("active lock poisoned");
            std::mem::replace(&mut *active, address.clone())
        };

        if previous == address {
            return;
        }

        if let Some(prev) = &previous {
            self.inner.registry.clear_connected(prev);
        }
        if let Some(addr) = &address {
            self.inner.registry.mark_connected(addr, SystemTime::now());
        }

        self.inner.hooks.on_server_changed();
        if previous.is_none() != address.is_none() {
            self.inner.hooks.on_connectivity_change();
        }
    }

    /// Close one connection and drop the probe/active state tied to it.
    fn close_connection(&self, address: &ServerAddress) {
        if !self.inner.pool.close(address) {
            return;
        }

        self.inner.tracker.forget(address);

        let was_active = {
            let mut active = self.inner.active.lock().expect("active lock poisoned");
            if active.as_ref() == Some(address) {
                *active = None;
                true
            } else {
                false
            }
        };

        if was_active {
            self.inner.registry.clear_connected(address);
            self.inner.hooks.on_connectivity_change();
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.lock().expect("driver lock poisoned").take() {
            driver.abort();
        }
        self.pool.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TopperError;

    /// Hooks that record every event for assertions.
    #[derive(Default)]
    struct RecordingHooks {
        connectivity_changes: Mutex<usize>,
        server_changes: Mutex<usize>,
        messages: Mutex<Vec<Bytes>>,
    }

    impl EventHooks for Arc<RecordingHooks> {
        fn on_connectivity_change(&self) {
            *self.connectivity_changes.lock().unwrap() += 1;
        }

        fn on_server_changed(&self) {
            *self.server_changes.lock().unwrap() += 1;
        }

        fn on_message_received(&self, payload: Bytes) {
            self.messages.lock().unwrap().push(payload);
        }
    }

    fn recording_client() -> (Client, Arc<RecordingHooks>) {
        let hooks = Arc::new(RecordingHooks::default());
        let client = Client::builder().hooks(hooks.clone()).build();
        (client, hooks)
    }

    fn addr(port: u16) -> ServerAddress {
        ServerAddress::new("example.com", port)
    }

    #[test]
    fn test_add_server_parses_and_registers() {
        let client = Client::builder().build();

        let address = client.add_server("example.com:9000").unwrap();
        assert_eq!(address, addr(9000));
        assert_eq!(client.get_servers(), vec![addr(9000)]);

        let info = client.get_server_info(&address).unwrap();
        assert!(info.ping.is_none());
    }

    #[test]
    fn test_add_server_rejects_bad_port() {
        let client = Client::builder().build();
        assert!(matches!(
            client.add_server("example.com:abc"),
            Err(TopperError::MalformedAddress { .. })
        ));
        assert!(client.get_servers().is_empty());
    }

    #[test]
    fn test_remove_server_destroys_record() {
        let client = Client::builder().build();
        let address = client.add_server("example.com").unwrap();

        client.remove_server(&address);

        assert!(client.get_servers().is_empty());
        assert!(matches!(
            client.get_server_info(&address),
            Err(TopperError::UnknownServer(_))
        ));
    }

    #[test]
    fn test_builder_configuration() {
        let client = Client::builder()
            .ping_timeout(Duration::from_secs(5))
            .probe_interval(Duration::from_secs(30))
            .sweep_policy(SweepPolicy::Concurrent)
            .read_buffer_size(8 * 1024)
            .build();

        assert_eq!(client.inner.config.ping_timeout, Duration::from_secs(5));
        assert_eq!(client.inner.config.probe_interval, Duration::from_secs(30));
        assert_eq!(client.inner.config.sweep_policy, SweepPolicy::Concurrent);
        assert_eq!(client.inner.config.read_buffer_size, 8 * 1024);
    }

    #[test]
    fn test_set_active_server_fires_hooks_and_marks_registry() {
        let (client, hooks) = recording_client();
        let address = client.add_server("example.com").unwrap();

        client.set_active_server(Some(address.clone()));

        assert_eq!(client.get_connected_server(), Some(address.clone()));
        assert_eq!(*hooks.server_changes.lock().unwrap(), 1);
        assert_eq!(*hooks.connectivity_changes.lock().unwrap(), 1);

        let info = client.get_server_info(&address).unwrap();
        assert!(info.connected_since.is_some());

        client.set_active_server(None);
        assert_eq!(client.get_connected_server(), None);
        assert_eq!(*hooks.connectivity_changes.lock().unwrap(), 2);

        let info = client.get_server_info(&address).unwrap();
        assert!(info.connected_since.is_none());
    }

    #[test]
    fn test_set_active_server_same_value_is_noop() {
        let (client, hooks) = recording_client();
        let address = client.add_server("example.com").unwrap();

        client.set_active_server(Some(address.clone()));
        client.set_active_server(Some(address));

        assert_eq!(*hooks.server_changes.lock().unwrap(), 1);
    }

    #[test]
    fn test_switching_active_server_changes_without_connectivity_event() {
        let (client, hooks) = recording_client();
        let first = client.add_server("example.com:1").unwrap();
        let second = client.add_server("example.com:2").unwrap();

        client.set_active_server(Some(first.clone()));
        client.set_active_server(Some(second.clone()));

        // Two server changes, but connectivity only appeared once.
        assert_eq!(*hooks.server_changes.lock().unwrap(), 2);
        assert_eq!(*hooks.connectivity_changes.lock().unwrap(), 1);

        assert!(client
            .get_server_info(&first)
            .unwrap()
            .connected_since
            .is_none());
        assert!(client
            .get_server_info(&second)
            .unwrap()
            .connected_since
            .is_some());
    }

    #[tokio::test]
    async fn test_dispatch_pong_resolves_outstanding_ping() {
        let (client, _) = recording_client();
        let address = addr(1);

        let pong = client.inner.tracker.register(&address);
        client.inner.dispatch(&address, Bytes::new());

        pong.await.unwrap();
    }

    #[test]
    fn test_dispatch_late_pong_is_discarded() {
        let (client, hooks) = recording_client();

        // No outstanding ping for this address; must not panic or forward.
        client.inner.dispatch(&addr(1), Bytes::new());

        assert!(hooks.messages.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_forwards_data_from_active_server_only() {
        let (client, hooks) = recording_client();
        let active = client.add_server("example.com:1").unwrap();
        let other = client.add_server("example.com:2").unwrap();
        client.set_active_server(Some(active.clone()));

        client
            .inner
            .dispatch(&other, Bytes::from_static(b"dropped"));
        client
            .inner
            .dispatch(&active, Bytes::from_static(b"delivered"));

        let messages = hooks.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(&messages[0][..], b"delivered");
    }

    #[test]
    fn test_dispatch_control_frame_never_reaches_application() {
        let (client, hooks) = recording_client();
        let active = client.add_server("example.com:1").unwrap();
        client.set_active_server(Some(active.clone()));

        let _pong = client.inner.tracker.register(&active);
        client.inner.dispatch(&active, Bytes::new());

        assert!(hooks.messages.lock().unwrap().is_empty());
    }
}
