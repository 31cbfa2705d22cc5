//! Transport abstractions.
//!
//! A [`Connector`] opens one physical connection and hands back a
//! [`Transport`]: a write half ([`FrameSink`]) and a read half
//! ([`FrameStream`]). The connection manager owns at most one transport at
//! a time and never looks past these traits.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use url::Url;

use crate::error::Result;

// ============================================================================
// Frame
// ============================================================================

/// One data frame on the wire.
///
/// Transport-level control frames (WebSocket ping/pong/close) never
/// surface as frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Frame {
    /// Returns the frame length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    /// Returns `true` if the frame carries no bytes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Types
// ============================================================================

/// Read half of a transport.
///
/// Ends (`None`) when the remote closes; yields `Err` on transport failure.
pub type FrameStream = BoxStream<'static, Result<Frame>>;

// ============================================================================
// FrameSink
// ============================================================================

/// Write half of a transport.
#[async_trait]
pub trait FrameSink: Send {
    /// Writes one frame.
    ///
    /// # Errors
    ///
    /// Any transport failure. The manager treats it as a lost connection.
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Starts a graceful close.
    ///
    /// # Errors
    ///
    /// Any transport failure; callers ignore it.
    async fn close(&mut self) -> Result<()>;
}

// ============================================================================
// Transport
// ============================================================================

/// An open physical connection.
pub struct Transport {
    /// Write half.
    pub sink: Box<dyn FrameSink>,
    /// Read half.
    pub stream: FrameStream,
}

impl Transport {
    /// Creates a transport from its halves.
    #[inline]
    #[must_use]
    pub fn new(sink: Box<dyn FrameSink>, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Opens physical connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens a connection to `url`.
    ///
    /// # Errors
    ///
    /// [`Error::Transport`](crate::Error::Transport) or
    /// [`Error::WebSocket`](crate::Error::WebSocket) when the connection
    /// cannot be established.
    async fn connect(&self, url: &Url) -> Result<Transport>;
}

// ============================================================================
// Tests
// ============================================================================
