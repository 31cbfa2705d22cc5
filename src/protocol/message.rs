//! Message types exchanged with the stream server.
//!
//! # Client → Server
//!
//! ```json
//! { "type": "subscribe", "topics": ["metrics_update", "alerts"] }
//! { "type": "unsubscribe", "topics": ["alerts"] }
//! { "type": "ping" }
//! { "type": "pong" }
//! ```
//!
//! # Server → Client
//!
//! Decoded into [`Message`] envelopes by the codec; see
//! [`codec`](super::codec) for the accepted frame shapes.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Message
// ============================================================================

/// An inbound update for one topic.
///
/// Built by the codec for each decoded frame and dropped after fan-out.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Topic used for fan-out filtering.
    pub topic: String,

    /// Payload as sent by the server.
    pub payload: Value,

    /// When the frame carrying this message was decoded.
    pub received_at: SystemTime,
}

impl Message {
    /// Creates a message stamped with the current time.
    #[inline]
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            received_at: SystemTime::now(),
        }
    }

    /// Deserializes the payload into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the payload does not
    /// match `T`.
    pub fn payload_as<T>(&self) -> crate::Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        Ok(T::deserialize(&self.payload)?)
    }
}

// ============================================================================
// ControlMessage
// ============================================================================

/// Protocol-level messages sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Declare the full set of topics of interest.
    Subscribe {
        /// Topics, sorted.
        topics: Vec<String>,
    },

    /// Withdraw interest in topics.
    Unsubscribe {
        /// Topics, sorted.
        topics: Vec<String>,
    },

    /// Liveness probe.
    Ping,

    /// Answer to a server ping.
    Pong,
}

impl ControlMessage {
    /// Creates a subscribe message from a topic set.
    #[inline]
    #[must_use]
    pub fn subscribe(topics: &BTreeSet<String>) -> Self {
        Self::Subscribe {
            topics: topics.iter().cloned().collect(),
        }
    }

    /// Creates an unsubscribe message from a topic set.
    #[inline]
    #[must_use]
    pub fn unsubscribe(topics: &BTreeSet<String>) -> Self {
        Self::Unsubscribe {
            topics: topics.iter().cloned().collect(),
        }
    }
}

// ============================================================================
// ClientMessage
// ============================================================================

/// Anything the client can write to the connection.
///
/// Wraps [`ControlMessage`] and free-form JSON for unified serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientMessage {
    /// Protocol control message.
    Control(ControlMessage),
    /// Application-defined JSON, written as-is.
    Custom(Value),
}

impl From<ControlMessage> for ClientMessage {
    #[inline]
    fn from(message: ControlMessage) -> Self {
        Self::Control(message)
    }
}

impl From<Value> for ClientMessage {
    #[inline]
    fn from(value: Value) -> Self {
        Self::Custom(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
