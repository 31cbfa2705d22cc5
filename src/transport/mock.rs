//! In-memory transport for tests.
//!
//! Every accepted connection is handed to the test as a [`MockServer`]
//! that can push frames to the client, read what the client wrote, and
//! drop the connection.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::poll_fn;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{Error, Result};

use super::connection::{Connector, Frame, FrameSink, Transport};

// ============================================================================
// Outcome
// ============================================================================

/// Scripted result of the next connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Accept,
    Refuse,
    Hang,
}

// ============================================================================
// MockConnector
// ============================================================================

/// Connector that serves in-memory connections.
#[derive(Clone)]
pub(crate) struct MockConnector {
    script: Arc<Mutex<VecDeque<Outcome>>>,
    attempts: Arc<AtomicUsize>,
    accepted_tx: mpsc::UnboundedSender<MockServer>,
}

impl MockConnector {
    /// Creates a connector and the receiver of accepted connections.
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<MockServer>) {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        let connector = Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            accepted_tx,
        };
        (connector, accepted_rx)
    }

    /// Queues outcomes for upcoming attempts. Unscripted attempts accept.
    pub(crate) fn script(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.script.lock().extend(outcomes);
    }

    /// Number of connection attempts so far.
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &Url) -> Result<Transport> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().pop_front().unwrap_or(Outcome::Accept);

        match outcome {
            Outcome::Refuse => return Err(Error::transport("connection refused")),
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
                return Err(Error::transport("hung attempt woke up"));
            }
            Outcome::Accept => {}
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));

        let server = MockServer {
            inbound_tx: Some(inbound_tx),
            outbound_rx,
            closed: Arc::clone(&closed),
        };
        self.accepted_tx
            .send(server)
            .map_err(|_| Error::transport("test dropped the accept receiver"))?;

        let sink = MockSink {
            outbound_tx,
            closed,
        };
        let mut inbound_rx = inbound_rx;
        let stream = poll_fn(move |cx| inbound_rx.poll_recv(cx)).boxed();

        Ok(Transport::new(Box::new(sink), stream))
    }
}

// ============================================================================
// MockSink
// ============================================================================

struct MockSink {
    outbound_tx: mpsc::UnboundedSender<Frame>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.outbound_tx
            .send(frame)
            .map_err(|_| Error::transport("mock peer gone"))
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// MockServer
// ============================================================================

/// Server side of one accepted mock connection.
pub(crate) struct MockServer {
    inbound_tx: Option<mpsc::UnboundedSender<Result<Frame>>>,
    outbound_rx: mpsc::UnboundedReceiver<Frame>,
    closed: Arc<AtomicBool>,
}

impl MockServer {
    /// Pushes a JSON text frame to the client.
    pub(crate) fn push(&self, value: Value) {
        self.push_frame(Frame::Text(value.to_string()));
    }

    /// Pushes a raw frame to the client.
    pub(crate) fn push_frame(&self, frame: Frame) {
        if let Some(tx) = &self.inbound_tx {
            let _ = tx.send(Ok(frame));
        }
    }

    /// Fails the connection with a transport error.
    pub(crate) fn fail(&mut self) {
        if let Some(tx) = self.inbound_tx.take() {
            let _ = tx.send(Err(Error::transport("mock connection reset")));
        }
    }

    /// Closes the connection from the server side.
    pub(crate) fn disconnect(&mut self) {
        self.inbound_tx = None;
    }

    /// Waits for the next frame written by the client, parsed as JSON.
    pub(crate) async fn next_sent(&mut self) -> Option<Value> {
        match self.outbound_rx.recv().await? {
            Frame::Text(text) => serde_json::from_str(&text).ok(),
            Frame::Binary(_) => None,
        }
    }

    /// Returns everything written so far without waiting.
    pub(crate) fn drain_sent(&mut self) -> Vec<Value> {
        let mut sent = Vec::new();
        while let Ok(Frame::Text(text)) = self.outbound_rx.try_recv() {
            if let Ok(value) = serde_json::from_str(&text) {
                sent.push(value);
            }
        }
        sent
    }

    /// Returns `true` once the client has closed its write half.
    pub(crate) fn client_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
