//! Shared stream client.
//!
//! Many logical subscribers share one physical connection. The connection
//! opens when the first subscriber arrives, closes when the last one
//! leaves, and reconnects with backoff while anyone is still subscribed.
//!
//! # Architecture
//!
//! ```text
//!  StreamClient (Clone) ──Command──► ConnectionManager task
//!         ▲                              │  registry   (subscribers, topic union)
//!         │                              │  policy     (backoff, attempt budget)
//!         └──── watch<ConnectionState> ──┤  heartbeat  (ping, staleness)
//!                                        │  codec      (frames ↔ messages)
//!                                        ▼
//!                                   Connector → Transport
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`StreamClientBuilder`] |
//! | `handle` | [`StreamClient`], the consumer API |
//! | `heartbeat` | Ping scheduling and staleness detection |
//! | `manager` | The task that owns the connection |
//! | `policy` | Reconnect backoff |
//! | `registry` | Subscribers and the topic union |
//! | `state` | [`ConnectionState`] and [`ClientEvent`] |

// ============================================================================
// Submodules
// ============================================================================

/// Client builder.
pub mod builder;

/// Consumer handle.
pub mod handle;

/// Heartbeat monitor.
pub mod heartbeat;

/// Connection manager task.
mod manager;

/// Reconnect policy.
pub mod policy;

/// Subscriber registry.
pub mod registry;

/// Connection state and events.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::StreamClientBuilder;
pub use handle::StreamClient;
pub use heartbeat::{HeartbeatAction, HeartbeatMonitor};
pub use policy::{BackoffKind, ReconnectPolicy};
pub use registry::{Change, Dispatch, MessageHandler, SubscriberRegistry, Subscription};
pub use state::{ClientEvent, ConnectionState, EventHandler};
