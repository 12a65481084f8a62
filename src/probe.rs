//! Outstanding-ping tracking.
//!
//! Each in-flight ping is a single-shot completion: the waiting `ping` call
//! holds the receiver, and the read-loop side fulfils the sender when a pong
//! (zero-length frame) arrives for that address. At most one ping per
//! address is tracked; callers serialize pings per address.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::address::ServerAddress;

/// Tracker of pings awaiting their pong or timeout.
#[derive(Debug, Default)]
pub struct PingTracker {
    pending: Mutex<HashMap<ServerAddress, oneshot::Sender<()>>>,
}

impl PingTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an outstanding ping for `address` and return the completion
    /// receiver.
    ///
    /// A ping registered while one is already outstanding replaces the
    /// previous entry, whose waiter then observes a receive error.
    pub fn register(&self, address: &ServerAddress) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();

        self.pending
            .lock()
            .expect("ping tracker lock poisoned")
            .insert(address.clone(), tx);

        rx
    }

    /// Fulfil the outstanding ping for `address`, if any.
    ///
    /// Returns `false` when no ping is outstanding; late or duplicate pongs
    /// are discarded this way.
    pub fn resolve(&self, address: &ServerAddress) -> bool {
        let sender = self
            .pending
            .lock()
            .expect("ping tracker lock poisoned")
            .remove(address);

        match sender {
            // The waiter may already be gone (timed out between the map
            // lookup and this send); either way the pong is consumed.
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Drop the outstanding ping for `address`, if any.
    ///
    /// The waiter, if still present, observes a receive error immediately
    /// instead of staying parked until its timer fires.
    pub fn forget(&self, address: &ServerAddress) {
        self.pending
            .lock()
            .expect("ping tracker lock poisoned")
            .remove(address);
    }

    /// Drop every outstanding ping, unblocking all waiters.
    pub fn clear(&self) {
        self.pending
            .lock()
            .expect("ping tracker lock poisoned")
            .clear();
    }

    /// Whether a ping is currently outstanding for `address`.
    pub fn is_pending(&self, address: &ServerAddress) -> bool {
        self.pending
            .lock()
            .expect("ping tracker lock poisoned")
            .contains_key(address)
    }

    /// Number of addresses with an outstanding ping.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .expect("ping tracker lock poisoned")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> ServerAddress {
        ServerAddress::new("example.com", port)
    }

    #[tokio::test]
    async fn test_resolve_completes_the_waiter() {
        let tracker = PingTracker::new();
        let rx = tracker.register(&addr(1));

        assert!(tracker.is_pending(&addr(1)));
        assert!(tracker.resolve(&addr(1)));

        rx.await.unwrap();
        assert!(!tracker.is_pending(&addr(1)));
    }

    #[test]
    fn test_resolve_without_outstanding_ping_is_noop() {
        let tracker = PingTracker::new();
        assert!(!tracker.resolve(&addr(1)));
    }

    #[test]
    fn test_resolve_is_single_shot() {
        let tracker = PingTracker::new();
        let _rx = tracker.register(&addr(1));

        assert!(tracker.resolve(&addr(1)));
        assert!(!tracker.resolve(&addr(1)));
    }

    #[tokio::test]
    async fn test_forget_unblocks_the_waiter_with_an_error() {
        let tracker = PingTracker::new();
        let rx = tracker.register(&addr(1));

        tracker.forget(&addr(1));

        assert!(rx.await.is_err());
        assert!(!tracker.is_pending(&addr(1)));
    }

    #[tokio::test]
    async fn test_re_register_replaces_previous_waiter() {
        let tracker = PingTracker::new();
        let first = tracker.register(&addr(1));
        let second = tracker.register(&addr(1));

        assert_eq!(tracker.pending_count(), 1);
        assert!(tracker.resolve(&addr(1)));

        assert!(first.await.is_err());
        second.await.unwrap();
    }

    #[test]
    fn test_pings_are_tracked_per_address() {
        let tracker = PingTracker::new();
        let _rx1 = tracker.register(&addr(1));
        let _rx2 = tracker.register(&addr(2));

        assert_eq!(tracker.pending_count(), 2);
        assert!(tracker.resolve(&addr(1)));
        assert!(tracker.is_pending(&addr(2)));
    }
}
