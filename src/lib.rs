//! Topic Stream - Resilient multiplexed subscription client.
//!
//! This library keeps one persistent WebSocket connection to a streaming
//! server and shares it between any number of topic subscribers.
//!
//! # Architecture
//!
//! The client follows an actor model:
//!
//! - **Handles ([`StreamClient`])**: Cloneable, forward every call as a command
//! - **Manager task**: Owns the connection, subscribers, timers, and heartbeat
//!
//! Key design principles:
//!
//! - At most one physical connection per client
//! - The connection exists only while someone is subscribed
//! - Subscriptions survive reconnects and are re-announced on open
//! - Connection failures become state changes and events, never panics
//!
//! # Quick Start
//!
//! ```no_run
//! use topic_stream::{ClientConfig, Result, StreamClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ClientConfig::new("ws://localhost:8000/ws/metrics")?;
//!     let client = StreamClient::new(config)?;
//!
//!     let id = client.subscribe(["metrics_update", "alert"], |message| {
//!         println!("[{}] {}", message.topic, message.payload);
//!     })?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     client.unsubscribe(id);
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`batch`] | Batched outbound reporting |
//! | [`client`] | [`StreamClient`], connection state, subscribers |
//! | [`config`] | [`ClientConfig`] and [`ClientOptions`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Message types and frame codec |
//! | [`transport`] | Connector seam and WebSocket transport |
//!
//! # Features
//!
//! - **Debounced connect**: subscribe/unsubscribe churn opens nothing
//! - **Backoff**: linear or exponential, capped, with an attempt budget
//! - **Heartbeat**: periodic ping and stale-connection detection
//! - **Compressed payloads**: hex/base64 gzip text and binary frames

// ============================================================================
// Modules
// ============================================================================

/// Batched outbound reporting.
///
/// Use [`BatchDispatcher`] with [`HttpBatchTransport`] to post measurements.
pub mod batch;

/// Stream client and connection lifecycle.
///
/// Use [`StreamClient::new()`] or [`StreamClient::builder()`] to start.
pub mod client;

/// Client configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Stream protocol message types and codec.
pub mod protocol;

/// Transport layer.
///
/// The [`Connector`] trait is the seam for custom transports.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Batch types
pub use batch::{
    BatchDispatcher, BatchTransport, DispatcherConfig, EnvelopeKey, HttpBatchTransport,
    MetricRecord,
};

// Client types
pub use client::{
    BackoffKind, ClientEvent, ConnectionState, EventHandler, MessageHandler, ReconnectPolicy,
    StreamClient, StreamClientBuilder,
};

// Configuration types
pub use config::{ClientConfig, ClientOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{SessionId, SubscriptionId};

// Protocol types
pub use protocol::{ClientMessage, ControlMessage, Decoded, JsonCodec, Message, MessageCodec};

// Transport types
pub use transport::{Connector, Frame, FrameSink, FrameStream, Transport, WsConnector};
