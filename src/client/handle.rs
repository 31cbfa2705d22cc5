//! Consumer-facing client handle.
//!
//! [`StreamClient`] is cheap to clone; every clone talks to the same
//! manager task and therefore the same physical connection.
//!
//! # Example
//!
//! ```no_run
//! use topic_stream::{ClientConfig, StreamClient};
//!
//! # async fn example() -> topic_stream::Result<()> {
//! let client = StreamClient::new(ClientConfig::new("ws://localhost:8000/ws/metrics")?)?;
//!
//! let id = client.subscribe(["metrics_update"], |message| {
//!     println!("{}: {}", message.topic, message.payload);
//! })?;
//!
//! // Later, when the view goes away.
//! client.unsubscribe(id);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;
use crate::protocol::{ClientMessage, Message};

use super::builder::StreamClientBuilder;
use super::manager::Command;
use super::registry::Subscription;
use super::state::ConnectionState;

// ============================================================================
// StreamClient
// ============================================================================

/// Handle to the shared stream connection.
///
/// Dropping the last clone closes the connection and stops the manager task.
#[derive(Clone)]
pub struct StreamClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl StreamClient {
    /// Creates a client with the default WebSocket connector and JSON codec.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the configuration is invalid or no runtime is
    /// running.
    pub fn new(config: ClientConfig) -> Result<Self> {
        StreamClientBuilder::new(config).build()
    }

    /// Creates a builder for customizing connector, codec, and events.
    #[inline]
    #[must_use]
    pub fn builder(config: ClientConfig) -> StreamClientBuilder {
        StreamClientBuilder::new(config)
    }

    pub(crate) fn from_parts(
        commands: mpsc::UnboundedSender<Command>,
        state: watch::Receiver<ConnectionState>,
    ) -> Self {
        Self { commands, state }
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Registers `handler` for messages on any of `topics`.
    ///
    /// The first subscriber opens the connection after the configured grace
    /// window. The handler runs on the manager task and must not block.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `topics` is empty
    /// - [`Error::ConnectionClosed`] after [`shutdown`](Self::shutdown)
    pub fn subscribe<I, S, F>(&self, topics: I, handler: F) -> Result<SubscriptionId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let topics: BTreeSet<String> = topics.into_iter().map(Into::into).collect();
        if topics.is_empty() {
            return Err(Error::invalid_argument("subscribe needs at least one topic"));
        }

        let id = SubscriptionId::generate();
        let subscription = Subscription::new(id, topics, Box::new(handler));

        self.command(Command::Subscribe(subscription))?;
        debug!(%id, "Subscribe requested");
        Ok(id)
    }

    /// Removes a subscriber. Unknown or already removed ids are ignored.
    ///
    /// Removing the last subscriber closes the connection.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let _ = self.command(Command::Unsubscribe(id));
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Sends a message on the open connection.
    ///
    /// # Errors
    ///
    /// - [`Error::ReconnectExhausted`] while [`ConnectionState::Failed`]
    /// - [`Error::NotConnected`] in any other state but [`ConnectionState::Open`]
    /// - [`Error::ConnectionClosed`] after [`shutdown`](Self::shutdown)
    pub fn send(&self, message: impl Into<ClientMessage>) -> Result<()> {
        if self.commands.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        match *self.state.borrow() {
            ConnectionState::Open => {}
            ConnectionState::Failed { attempts } => {
                return Err(Error::reconnect_exhausted(attempts));
            }
            state => return Err(Error::not_connected(state)),
        }

        self.command(Command::Send(message.into()))
    }

    /// Sends application JSON as is.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    #[inline]
    pub fn send_json(&self, value: Value) -> Result<()> {
        self.send(ClientMessage::Custom(value))
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Returns `true` while reconnecting or failed.
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.state().is_degraded()
    }

    /// Returns a receiver that observes every state change.
    #[inline]
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Waits until the state satisfies `predicate`.
    ///
    /// Returns immediately if it already does.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] if the manager task stops first.
    pub async fn wait_for_state<F>(&self, mut predicate: F) -> Result<ConnectionState>
    where
        F: FnMut(ConnectionState) -> bool,
    {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|current| predicate(*current))
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(*reached)
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Leaves [`ConnectionState::Failed`] and reconnects if anyone is
    /// subscribed. No-op in any other state.
    pub fn reset(&self) {
        let _ = self.command(Command::Reset);
    }

    /// Closes the connection and stops the manager task.
    ///
    /// Calls on any clone fail with [`Error::ConnectionClosed`] afterwards.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.command(Command::Shutdown(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::ConnectionClosed)
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
