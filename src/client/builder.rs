//! Builder for [`StreamClient`].
//!
//! # Example
//!
//! ```no_run
//! use topic_stream::{ClientConfig, StreamClient};
//!
//! # async fn example() -> topic_stream::Result<()> {
//! let config = ClientConfig::from_origin("https://dash.example.com", "/ws/metrics")?;
//! let client = StreamClient::builder(config)
//!     .on_event(|event| tracing::debug!(?event, "stream event"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::{JsonCodec, MessageCodec};
use crate::transport::{Connector, WsConnector};

use super::handle::StreamClient;
use super::manager::ConnectionManager;
use super::state::{ClientEvent, ConnectionState, EventHandler};

// ============================================================================
// StreamClientBuilder
// ============================================================================

/// Builder for configuring a [`StreamClient`].
///
/// Use [`StreamClient::builder()`] to create one. Unset parts default to
/// [`WsConnector`] and [`JsonCodec`].
pub struct StreamClientBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
    codec: Option<Box<dyn MessageCodec>>,
    event_handler: Option<EventHandler>,
}

impl StreamClientBuilder {
    /// Creates a builder for `config`.
    #[inline]
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            connector: None,
            codec: None,
            event_handler: None,
        }
    }

    /// Sets the transport connector.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Sets the frame codec.
    #[inline]
    #[must_use]
    pub fn codec(mut self, codec: impl MessageCodec) -> Self {
        self.codec = Some(Box::new(codec));
        self
    }

    /// Sets the lifecycle event handler.
    ///
    /// The handler runs on the manager task and must not block.
    #[inline]
    #[must_use]
    pub fn on_event<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.event_handler = Some(Box::new(handler));
        self
    }

    /// Validates the configuration and spawns the manager task.
    ///
    /// No connection is opened until the first subscriber arrives.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn build(self) -> Result<StreamClient> {
        self.config.validate()?;

        let runtime = Handle::try_current()
            .map_err(|_| Error::config("StreamClient must be built inside a tokio runtime"))?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector));
        let codec = self.codec.unwrap_or_else(|| Box::new(JsonCodec));

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);

        let manager = ConnectionManager::new(
            self.config,
            connector,
            codec,
            self.event_handler,
            command_rx,
            state_tx,
        );
        runtime.spawn(manager.run());

        Ok(StreamClient::from_parts(command_tx, state_rx))
    }
}

impl fmt::Debug for StreamClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClientBuilder")
            .field("config", &self.config)
            .field("custom_connector", &self.connector.is_some())
            .field("custom_codec", &self.codec.is_some())
            .field("event_handler", &self.event_handler.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
