//! Client configuration.
//!
//! | Type | Use |
//! |------|-----|
//! | [`ClientConfig`] | Validated, typed configuration |
//! | [`ClientOptions`] | Serde options object with millisecond fields |

// ============================================================================
// Submodules
// ============================================================================

/// Validated configuration and defaults.
pub mod client;

/// Serializable options object.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::ClientConfig;
pub use options::ClientOptions;
