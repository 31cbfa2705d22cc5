//! Batched outbound reporting.
//!
//! Client-observed measurements are queued locally and posted in batches
//! instead of one request per record.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `dispatcher` | Queue, timers, and the [`BatchTransport`] seam |
//! | `http` | reqwest transport and [`MetricRecord`] |

// ============================================================================
// Submodules
// ============================================================================

/// Batch queue and flush policy.
pub mod dispatcher;

/// HTTP transport.
pub mod http;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::{BatchDispatcher, BatchTransport, DispatcherConfig, EnvelopeKey};
pub use http::{HttpBatchTransport, MetricRecord};
