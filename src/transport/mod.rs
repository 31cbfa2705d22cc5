//! Transport layer.
//!
//! This module opens the single physical connection the client uses.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                         ┌─────────────────┐
//! │  ConnectionManager   │                         │  Stream server  │
//! │                      │        WebSocket        │                 │
//! │  Connector::connect  │◄───────────────────────►│  /ws/<path>     │
//! │  → Transport         │   ws:// or wss:// URL   │                 │
//! │    (sink + stream)   │                         │                 │
//! └──────────────────────┘                         └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | `Frame`, `Transport` and the `Connector` seam |
//! | `websocket` | tokio-tungstenite connector |

// ============================================================================
// Submodules
// ============================================================================

/// Frame, transport halves and connector trait.
pub mod connection;

/// WebSocket connector.
pub mod websocket;

/// In-memory connector for tests.
#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connector, Frame, FrameSink, FrameStream, Transport};
pub use websocket::WsConnector;
