//! Stream protocol message types and codec.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `ControlMessage` | Local → Server | subscribe, unsubscribe, ping, pong |
//! | `ClientMessage::Custom` | Local → Server | Application JSON |
//! | `Message` | Server → Local | Topic update envelope |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Frame decoding and encoding |
//! | `compression` | hex/base64 gzip and binary inflate |
//! | `message` | Message and control types |

// ============================================================================
// Submodules
// ============================================================================

/// Frame decoding and encoding.
pub mod codec;

/// Compressed payload handling.
pub mod compression;

/// Message and control types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{Decoded, JsonCodec, MessageCodec};
pub use message::{ClientMessage, ControlMessage, Message};
