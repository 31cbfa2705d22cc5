//! Connection liveness monitor.
//!
//! Sans-IO: the manager feeds it the current time and acts on the returned
//! [`HeartbeatAction`]. Only one deadline exists at a time, so stopping the
//! monitor is enough to cancel it.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::time::Instant;

// ============================================================================
// HeartbeatAction
// ============================================================================

/// What the manager should do when the heartbeat deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Nothing due yet.
    Idle,
    /// Write a ping.
    SendPing,
    /// No inbound traffic within the timeout; force-close the connection.
    Stale,
}

// ============================================================================
// HeartbeatMonitor
// ============================================================================

/// Periodic ping plus staleness detection.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    timeout: Duration,
    /// `None` while stopped.
    running: Option<Running>,
}

#[derive(Debug, Clone, Copy)]
struct Running {
    next_ping: Instant,
    last_seen: Instant,
}

impl HeartbeatMonitor {
    /// Creates a stopped monitor.
    #[must_use]
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            running: None,
        }
    }

    /// Starts (or restarts) monitoring from `now`.
    pub fn start(&mut self, now: Instant) {
        self.running = Some(Running {
            next_ping: now + self.interval,
            last_seen: now,
        });
    }

    /// Stops monitoring and clears the deadline.
    pub fn stop(&mut self) {
        self.running = None;
    }

    /// Returns `true` while started.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Records inbound traffic at `now`.
    pub fn observe(&mut self, now: Instant) {
        if let Some(running) = self.running.as_mut() {
            running.last_seen = now;
        }
    }

    /// Returns the next instant at which [`poll`](Self::poll) has work.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.running
            .map(|running| running.next_ping.min(running.last_seen + self.timeout))
    }

    /// Advances the monitor to `now`.
    pub fn poll(&mut self, now: Instant) -> HeartbeatAction {
        let Some(running) = self.running.as_mut() else {
            return HeartbeatAction::Idle;
        };

        if now >= running.last_seen + self.timeout {
            return HeartbeatAction::Stale;
        }

        if now >= running.next_ping {
            running.next_ping = now + self.interval;
            return HeartbeatAction::SendPing;
        }

        HeartbeatAction::Idle
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> HeartbeatMonitor {
        HeartbeatMonitor::new(Duration::from_secs(10), Duration::from_secs(25))
    }

    #[test]
    fn test_stopped_monitor_has_no_deadline() {
        let mut hb = monitor();
        assert_eq!(hb.deadline(), None);
        assert_eq!(hb.poll(Instant::now()), HeartbeatAction::Idle);
    }

    #[test]
    fn test_pings_on_interval() {
        let start = Instant::now();
        let mut hb = monitor();
        hb.start(start);

        assert_eq!(hb.deadline(), Some(start + Duration::from_secs(10)));
        assert_eq!(hb.poll(start + Duration::from_secs(5)), HeartbeatAction::Idle);
        assert_eq!(hb.poll(start + Duration::from_secs(10)), HeartbeatAction::SendPing);
        assert_eq!(hb.deadline(), Some(start + Duration::from_secs(20)));
    }

    #[test]
    fn test_stale_without_traffic() {
        let start = Instant::now();
        let mut hb = monitor();
        hb.start(start);

        assert_eq!(hb.poll(start + Duration::from_secs(10)), HeartbeatAction::SendPing);
        assert_eq!(hb.poll(start + Duration::from_secs(20)), HeartbeatAction::SendPing);
        // next ping at 30s, but the 25s timeout comes first
        assert_eq!(hb.deadline(), Some(start + Duration::from_secs(25)));
        assert_eq!(hb.poll(start + Duration::from_secs(25)), HeartbeatAction::Stale);
    }

    #[test]
    fn test_traffic_keeps_alive() {
        let start = Instant::now();
        let mut hb = monitor();
        hb.start(start);

        hb.observe(start + Duration::from_secs(20));
        assert_eq!(hb.poll(start + Duration::from_secs(26)), HeartbeatAction::SendPing);
        assert_eq!(hb.deadline(), Some(start + Duration::from_secs(36)));
        assert_eq!(hb.poll(start + Duration::from_secs(45)), HeartbeatAction::Stale);
    }

    #[test]
    fn test_stop_clears_deadline() {
        let start = Instant::now();
        let mut hb = monitor();
        hb.start(start);
        hb.stop();
        assert!(!hb.is_running());
        assert_eq!(hb.deadline(), None);

        hb.observe(start);
        assert!(!hb.is_running());
    }
}
