//! Validated client configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use topic_stream::ClientConfig;
//!
//! let config = ClientConfig::from_origin("https://dash.example.com", "/ws/metrics")?
//!     .with_max_attempts(10)
//!     .with_heartbeat(Duration::from_secs(15), Duration::from_secs(45));
//!
//! assert_eq!(config.url.as_str(), "wss://dash.example.com/ws/metrics");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::client::policy::{BackoffKind, ReconnectPolicy};
use crate::error::{Error, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Default first reconnect delay.
pub const DEFAULT_RECONNECT_BASE: Duration = Duration::from_secs(1);

/// Default reconnect delay ceiling.
pub const DEFAULT_RECONNECT_CAP: Duration = Duration::from_secs(30);

/// Default reconnect budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default ping interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default liveness window.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(75);

/// Default outbound batch flush delay.
pub const DEFAULT_BATCH_FLUSH: Duration = Duration::from_secs(5);

/// Default first-connect debounce window.
pub const DEFAULT_CONNECT_GRACE: Duration = Duration::from_millis(100);

/// Default bound on a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ClientConfig
// ============================================================================

/// Stream client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub url: Url,

    /// Delay before the first reconnect attempt; later attempts scale it.
    pub reconnect_base: Duration,

    /// Upper bound on any reconnect delay.
    pub reconnect_cap: Duration,

    /// Reconnect attempts before giving up.
    pub max_attempts: u32,

    /// Backoff curve.
    pub backoff: BackoffKind,

    /// Ping period while open.
    pub heartbeat_interval: Duration,

    /// Maximum silence before the connection is considered dead.
    pub heartbeat_timeout: Duration,

    /// Outbound batch flush delay.
    pub batch_flush: Duration,

    /// Debounce before the first connect after the subscriber count leaves zero.
    pub connect_grace: Duration,

    /// Bound on one connection attempt.
    pub connect_timeout: Duration,
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientConfig {
    /// Creates a configuration for an explicit endpoint with default timings.
    ///
    /// # Errors
    ///
    /// [`Error::Url`] if `url` does not parse, [`Error::Config`] if its
    /// scheme is not `ws`, `wss`, `http` or `https`.
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        Ok(Self::with_url(to_websocket_url(url)?))
    }

    /// Derives the endpoint from an http(s) origin plus a path suffix.
    ///
    /// `http` maps to `ws`, `https` to `wss`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_origin(origin: &str, path: &str) -> Result<Self> {
        let mut url = to_websocket_url(Url::parse(origin)?)?;
        url.set_path(path);
        url.set_query(None);
        url.set_fragment(None);
        Ok(Self::with_url(url))
    }

    fn with_url(url: Url) -> Self {
        Self {
            url,
            reconnect_base: DEFAULT_RECONNECT_BASE,
            reconnect_cap: DEFAULT_RECONNECT_CAP,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffKind::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            batch_flush: DEFAULT_BATCH_FLUSH,
            connect_grace: DEFAULT_CONNECT_GRACE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientConfig {
    /// Sets base and cap reconnect delays.
    #[inline]
    #[must_use]
    pub fn with_reconnect(mut self, base: Duration, cap: Duration) -> Self {
        self.reconnect_base = base;
        self.reconnect_cap = cap;
        self
    }

    /// Sets the reconnect budget.
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the backoff curve.
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffKind) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets ping interval and liveness timeout.
    #[inline]
    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.heartbeat_timeout = timeout;
        self
    }

    /// Sets the outbound flush delay.
    #[inline]
    #[must_use]
    pub fn with_batch_flush(mut self, flush: Duration) -> Self {
        self.batch_flush = flush;
        self
    }

    /// Sets the first-connect debounce window.
    #[inline]
    #[must_use]
    pub fn with_connect_grace(mut self, grace: Duration) -> Self {
        self.connect_grace = grace;
        self
    }

    /// Sets the connection attempt bound.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientConfig {
    /// Checks that the timings are usable.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.reconnect_base.is_zero() {
            return Err(Error::config("reconnect base delay must be positive"));
        }
        if self.reconnect_cap < self.reconnect_base {
            return Err(Error::config("reconnect cap must be >= base delay"));
        }
        if self.max_attempts == 0 {
            return Err(Error::config("max attempts must be at least 1"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(Error::config("heartbeat interval must be positive"));
        }
        if self.heartbeat_timeout < self.heartbeat_interval {
            return Err(Error::config("heartbeat timeout must be >= heartbeat interval"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be positive"));
        }
        Ok(())
    }

    /// Returns the reconnect policy described by this configuration.
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.reconnect_base,
            self.reconnect_cap,
            self.max_attempts,
            self.backoff,
        )
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn to_websocket_url(mut url: Url) -> Result<Url> {
    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => return Err(Error::config(format!("unsupported URL scheme: {other}"))),
    };

    if url.scheme() != scheme {
        url.set_scheme(scheme)
            .map_err(|()| Error::config(format!("cannot convert {url} to {scheme}")))?;
    }

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================
