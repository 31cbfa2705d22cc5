//! Batched outbound delivery.
//!
//! Records accumulate in memory and go out as one request:
//!
//! - **Timer flush** `flush` after the most recent enqueue
//! - **Threshold flush** as soon as `max_batch` records are waiting
//! - **Explicit flush** through [`BatchDispatcher::flush`]
//! - **Page hide** through [`BatchDispatcher::page_hide`], fire-and-forget
//!
//! Every flush swaps the pending batch for an empty one under the lock and
//! sends the snapshot. Failed deliveries are logged and dropped.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default flush delay.
pub const DEFAULT_FLUSH: Duration = Duration::from_secs(5);

/// Default size threshold.
pub const DEFAULT_MAX_BATCH: usize = 100;

// ============================================================================
// EnvelopeKey
// ============================================================================

/// Top-level key the batch array is posted under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKey {
    /// `{"metrics": [...]}`
    #[default]
    Metrics,
    /// `{"chunks": [...]}`
    Chunks,
}

impl EnvelopeKey {
    /// Returns the JSON key.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metrics => "metrics",
            Self::Chunks => "chunks",
        }
    }

    /// Wraps `records` as `{<key>: [...]}`.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if a record fails to serialize.
    pub fn wrap<R: Serialize>(self, records: &[R]) -> Result<Value> {
        let mut body = Map::with_capacity(1);
        body.insert(self.as_str().to_string(), serde_json::to_value(records)?);
        Ok(Value::Object(body))
    }
}

// ============================================================================
// DispatcherConfig
// ============================================================================

/// Batching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Delay between the last enqueue and the flush.
    pub flush: Duration,
    /// Flush immediately once this many records are waiting.
    pub max_batch: usize,
    /// Envelope key.
    pub envelope: EnvelopeKey,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            flush: DEFAULT_FLUSH,
            max_batch: DEFAULT_MAX_BATCH,
            envelope: EnvelopeKey::default(),
        }
    }
}

impl DispatcherConfig {
    /// Sets the flush delay.
    #[inline]
    #[must_use]
    pub fn with_flush(mut self, flush: Duration) -> Self {
        self.flush = flush;
        self
    }

    /// Sets the size threshold.
    #[inline]
    #[must_use]
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    /// Sets the envelope key.
    #[inline]
    #[must_use]
    pub fn with_envelope(mut self, envelope: EnvelopeKey) -> Self {
        self.envelope = envelope;
        self
    }

    /// Checks that the parameters are usable.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the flush delay or threshold is zero.
    pub fn validate(&self) -> Result<()> {
        if self.flush.is_zero() {
            return Err(Error::config("batch flush delay must be positive"));
        }
        if self.max_batch == 0 {
            return Err(Error::config("max batch must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// BatchTransport
// ============================================================================

/// Delivery seam for batches.
#[async_trait]
pub trait BatchTransport: Send + Sync + 'static {
    /// Sends one batch body and waits for the result.
    async fn post(&self, body: Value) -> Result<()>;

    /// Hands `body` off for delivery without waiting.
    ///
    /// Returns `false` when unavailable; the dispatcher then falls back to a
    /// detached [`post`](Self::post).
    fn beacon(&self, _body: &Value) -> bool {
        false
    }
}

// ============================================================================
// BatchDispatcher
// ============================================================================

/// Accumulates records and delivers them in batches.
///
/// Cloning shares the pending batch.
pub struct BatchDispatcher<R> {
    shared: Arc<Shared<R>>,
}

struct Shared<R> {
    config: DispatcherConfig,
    transport: Arc<dyn BatchTransport>,
    state: Mutex<State<R>>,
}

struct State<R> {
    batch: Vec<R>,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever the timer is replaced or cancelled.
    generation: u64,
}

impl<R> State<R> {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    fn take(&mut self) -> Vec<R> {
        self.cancel_timer();
        std::mem::take(&mut self.batch)
    }
}

impl<R> Clone for BatchDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> BatchDispatcher<R>
where
    R: Serialize + Send + 'static,
{
    /// Creates a dispatcher.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `config` is invalid.
    pub fn new(config: DispatcherConfig, transport: impl BatchTransport) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                transport: Arc::new(transport),
                state: Mutex::new(State {
                    batch: Vec::with_capacity(config.max_batch),
                    timer: None,
                    generation: 0,
                }),
            }),
        })
    }

    /// Number of records waiting.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.lock().batch.len()
    }

    /// Returns `true` if nothing is waiting.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().batch.is_empty()
    }

    /// Appends a record and restarts the flush timer.
    ///
    /// Reaching `max_batch` flushes right away. Outside a tokio runtime no
    /// timer runs and records wait for [`flush`](Self::flush), even past
    /// `max_batch`.
    pub fn enqueue(&self, record: R) {
        let mut state = self.shared.state.lock();
        state.batch.push(record);

        let Ok(runtime) = Handle::try_current() else {
            let pending = state.batch.len();
            trace!(pending, "No runtime; record waits for an explicit flush");
            return;
        };

        if state.batch.len() >= self.shared.config.max_batch {
            let records = state.take();
            drop(state);
            trace!(count = records.len(), "Batch threshold reached");

            let shared = Arc::clone(&self.shared);
            runtime.spawn(async move { shared.send(records).await });
            return;
        }

        state.cancel_timer();

        let generation = state.generation;
        let shared = Arc::clone(&self.shared);

        state.timer = Some(runtime.spawn(async move {
            sleep(shared.config.flush).await;

            let records = {
                let mut state = shared.state.lock();
                if state.generation != generation {
                    return;
                }
                state.timer = None;
                std::mem::take(&mut state.batch)
            };

            shared.send(records).await;
        }));
    }

    /// Sends everything waiting and waits for the result.
    pub async fn flush(&self) {
        let records = self.shared.state.lock().take();
        self.shared.send(records).await;
    }

    /// Hands everything waiting off without waiting.
    ///
    /// Call when the process is about to go away.
    pub fn page_hide(&self) {
        let records = self.shared.state.lock().take();
        if records.is_empty() {
            return;
        }

        let count = records.len();
        let body = match self.shared.config.envelope.wrap(&records) {
            Ok(body) => body,
            Err(e) => {
                warn!(count, error = %e, "Failed to serialize batch");
                return;
            }
        };

        if self.shared.transport.beacon(&body) {
            debug!(count, "Batch handed to beacon");
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(count, "No beacon and no runtime; batch dropped");
            return;
        };

        let transport = Arc::clone(&self.shared.transport);
        runtime.spawn(async move {
            if let Err(e) = transport.post(body).await {
                warn!(count, error = %e, "Page-hide delivery failed");
            }
        });
    }
}

impl<R> Shared<R>
where
    R: Serialize,
{
    async fn send(&self, records: Vec<R>) {
        if records.is_empty() {
            return;
        }

        let count = records.len();
        let body = match self.config.envelope.wrap(&records) {
            Ok(body) => body,
            Err(e) => {
                warn!(count, error = %e, "Failed to serialize batch");
                return;
            }
        };

        match self.transport.post(body).await {
            Ok(()) => debug!(count, "Batch delivered"),
            Err(e) => warn!(count, error = %e, "Batch delivery failed"),
        }
    }
}

impl<R> fmt::Debug for BatchDispatcher<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("BatchDispatcher")
            .field("config", &self.shared.config)
            .field("pending", &state.batch.len())
            .field("timer_armed", &state.timer.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
