//! Plain options object.
//!
//! Mirrors the configuration shape dashboards pass around as JSON, with
//! millisecond fields in camelCase. Convert into [`ClientConfig`] with
//! `TryFrom`; unset fields take the defaults.
//!
//! ```json
//! {
//!   "url": "wss://dash.example.com/ws/metrics",
//!   "reconnectBaseMs": 1000,
//!   "reconnectCapMs": 30000,
//!   "maxAttempts": 5,
//!   "heartbeatIntervalMs": 30000,
//!   "heartbeatTimeoutMs": 75000,
//!   "batchFlushMs": 5000
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::policy::BackoffKind;
use crate::error::{Error, Result};

use super::client::ClientConfig;

// ============================================================================
// ClientOptions
// ============================================================================

/// Serializable client options.
///
/// Either `url`, or `origin` plus `path`, must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientOptions {
    /// Explicit endpoint.
    pub url: Option<String>,
    /// Page origin the endpoint is derived from.
    pub origin: Option<String>,
    /// Path suffix appended to `origin`.
    pub path: Option<String>,
    /// First reconnect delay in ms.
    pub reconnect_base_ms: Option<u64>,
    /// Reconnect delay cap in ms.
    pub reconnect_cap_ms: Option<u64>,
    /// Reconnect budget.
    pub max_attempts: Option<u32>,
    /// Backoff curve.
    pub backoff: Option<BackoffKind>,
    /// Ping period in ms.
    pub heartbeat_interval_ms: Option<u64>,
    /// Liveness window in ms.
    pub heartbeat_timeout_ms: Option<u64>,
    /// Outbound flush delay in ms.
    pub batch_flush_ms: Option<u64>,
    /// First-connect debounce in ms.
    pub connect_grace_ms: Option<u64>,
    /// Connection attempt bound in ms.
    pub connect_timeout_ms: Option<u64>,
}

impl ClientOptions {
    /// Parses options from JSON text.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] on malformed input.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl TryFrom<ClientOptions> for ClientConfig {
    type Error = Error;

    fn try_from(options: ClientOptions) -> Result<Self> {
        let mut config = match (&options.url, &options.origin) {
            (Some(url), _) => ClientConfig::new(url)?,
            (None, Some(origin)) => {
                ClientConfig::from_origin(origin, options.path.as_deref().unwrap_or("/"))?
            }
            (None, None) => return Err(Error::config("either url or origin is required")),
        };

        let ms = Duration::from_millis;

        if let Some(v) = options.reconnect_base_ms {
            config.reconnect_base = ms(v);
        }
        if let Some(v) = options.reconnect_cap_ms {
            config.reconnect_cap = ms(v);
        }
        if let Some(v) = options.max_attempts {
            config.max_attempts = v;
        }
        if let Some(v) = options.backoff {
            config.backoff = v;
        }
        if let Some(v) = options.heartbeat_interval_ms {
            config.heartbeat_interval = ms(v);
        }
        if let Some(v) = options.heartbeat_timeout_ms {
            config.heartbeat_timeout = ms(v);
        }
        if let Some(v) = options.batch_flush_ms {
            config.batch_flush = ms(v);
        }
        if let Some(v) = options.connect_grace_ms {
            config.connect_grace = ms(v);
        }
        if let Some(v) = options.connect_timeout_ms {
            config.connect_timeout = ms(v);
        }

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_options() {
        let options = ClientOptions::from_json(
            r#"{
                "url": "ws://localhost:8000/ws/metrics",
                "reconnectBaseMs": 500,
                "reconnectCapMs": 4000,
                "maxAttempts": 8,
                "backoff": "exponential",
                "heartbeatIntervalMs": 10000,
                "heartbeatTimeoutMs": 25000,
                "batchFlushMs": 2000
            }"#,
        )
        .unwrap();

        let config = ClientConfig::try_from(options).unwrap();
        assert_eq!(config.url.as_str(), "ws://localhost:8000/ws/metrics");
        assert_eq!(config.reconnect_base, Duration::from_millis(500));
        assert_eq!(config.reconnect_cap, Duration::from_secs(4));
        assert_eq!(config.max_attempts, 8);
        assert_eq!(config.backoff, BackoffKind::Exponential);
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(25));
        assert_eq!(config.batch_flush, Duration::from_secs(2));
    }

    #[test]
    fn test_origin_and_path() {
        let options = ClientOptions {
            origin: Some("https://grafana.local".into()),
            path: Some("/ws/logs".into()),
            ..Default::default()
        };
        let config = ClientConfig::try_from(options).unwrap();
        assert_eq!(config.url.as_str(), "wss://grafana.local/ws/logs");
    }

    #[test]
    fn test_missing_endpoint() {
        let err = ClientConfig::try_from(ClientOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_invalid_timings_rejected() {
        let options = ClientOptions {
            url: Some("ws://localhost/ws".into()),
            max_attempts: Some(0),
            ..Default::default()
        };
        assert!(ClientConfig::try_from(options).is_err());
    }
}
