//! Connection state and lifecycle events.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use crate::identifiers::SubscriptionId;

// ============================================================================
// ConnectionState
// ============================================================================

/// State of the single physical connection.
///
/// ```text
/// Idle → Connecting → Open → Closing → Idle
///            ↑          │
///            │          ↓
///            └── Reconnecting(n) ──→ Failed (until reset)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection and none wanted.
    #[default]
    Idle,
    /// Connection attempt in flight.
    Connecting,
    /// Connected; messages flow.
    Open,
    /// Tearing down on request.
    Closing,
    /// Waiting to retry after a lost connection.
    Reconnecting {
        /// Attempt about to be made (1-based).
        attempt: u32,
    },
    /// Retry budget exhausted. Stays here until reset.
    Failed {
        /// Reconnect attempts made before giving up.
        attempts: u32,
    },
}

impl ConnectionState {
    /// Returns `true` if messages can be sent.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if consumers should show a disconnected indicator.
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Reconnecting { .. } | Self::Failed { .. })
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Open => f.write_str("open"),
            Self::Closing => f.write_str("closing"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting({attempt})"),
            Self::Failed { attempts } => write!(f, "failed({attempts})"),
        }
    }
}

// ============================================================================
// ClientEvent
// ============================================================================

/// Lifecycle notification delivered to the client's event handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The state changed.
    StateChanged {
        /// Previous state.
        from: ConnectionState,
        /// New state.
        to: ConnectionState,
    },

    /// The connection opened and the subscribe message was sent.
    Connected,

    /// An open connection was lost or closed.
    Disconnected {
        /// Why the connection ended.
        reason: String,
    },

    /// A frame could not be decoded and was dropped.
    DecodeError {
        /// Decoder message.
        message: String,
    },

    /// Opening or writing to the transport failed.
    TransportError {
        /// Transport message.
        message: String,
    },

    /// A reconnect was scheduled.
    ReconnectScheduled {
        /// Attempt number (1-based).
        attempt: u32,
        /// Wait before the attempt.
        delay: Duration,
    },

    /// A subscriber handler panicked. Delivery to other subscribers went on.
    HandlerPanicked {
        /// Subscription whose handler panicked.
        subscription: SubscriptionId,
        /// Topic of the message being delivered.
        topic: String,
    },

    /// Retry budget exhausted; the client is in [`ConnectionState::Failed`].
    ReconnectExhausted {
        /// Attempts made.
        attempts: u32,
    },
}

/// Event handler callback type.
///
/// Called on the manager task for every [`ClientEvent`]; must not block.
/// A panic is caught and logged.
pub type EventHandler = Box<dyn Fn(&ClientEvent) + Send + Sync>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_states() {
        assert!(ConnectionState::Reconnecting { attempt: 1 }.is_degraded());
        assert!(ConnectionState::Failed { attempts: 3 }.is_degraded());
        assert!(!ConnectionState::Open.is_degraded());
        assert!(!ConnectionState::Idle.is_degraded());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(
            ConnectionState::Reconnecting { attempt: 3 }.to_string(),
            "reconnecting(3)"
        );
        assert_eq!(ConnectionState::Failed { attempts: 5 }.to_string(), "failed(5)");
    }
}
