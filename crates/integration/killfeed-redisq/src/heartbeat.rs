//! Liveness signalling
//!
//! The poll loop pings once per successful cycle, kill or empty tick.
//! A missing ping is the only outward sign of transient failures.

use chrono::{DateTime, Duration, Utc};
use killfeed_core::Clock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Fire-and-forget liveness notification
pub trait Heartbeat: Send + Sync {
    fn ping(&self);
}

impl<F> Heartbeat for F
where
    F: Fn() + Send + Sync,
{
    fn ping(&self) {
        self()
    }
}

/// Heartbeat that remembers when it was last pinged
pub struct ConnectionMonitor {
    clock: Arc<dyn Clock>,
    last_ping: Mutex<Option<DateTime<Utc>>>,
    pings: AtomicU64,
}

impl ConnectionMonitor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_ping: Mutex::new(None),
            pings: AtomicU64::new(0),
        }
    }

    pub fn last_ping(&self) -> Option<DateTime<Utc>> {
        *self.last_ping.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ping_count(&self) -> u64 {
        self.pings.load(Ordering::Relaxed)
    }

    /// Alive if pinged within `stale_after` of `now`
    pub fn is_live(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        self.last_ping()
            .map(|at| now - at < stale_after)
            .unwrap_or(false)
    }
}

impl Heartbeat for ConnectionMonitor {
    fn ping(&self) {
        let now = self.clock.now();
        *self.last_ping.lock().unwrap_or_else(|e| e.into_inner()) = Some(now);
        self.pings.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use killfeed_core::ManualClock;

    #[test]
    fn test_connection_liveness() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let monitor = ConnectionMonitor::new(clock.clone());
        let stale = Duration::seconds(30);

        assert!(!monitor.is_live(clock.now(), stale));

        monitor.ping();
        assert_eq!(monitor.ping_count(), 1);
        assert!(monitor.is_live(clock.now(), stale));

        clock.advance(Duration::seconds(31));
        assert!(!monitor.is_live(clock.now(), stale));
    }

    #[test]
    fn test_closure_heartbeat() {
        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        let heartbeat = move || {
            counter.fetch_add(1, Ordering::SeqCst);
        };
        heartbeat.ping();
        heartbeat.ping();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
