//! HTTP delivery and the stock metric record.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tracing::{debug, trace};
use url::Url;

use crate::error::Result;
use crate::identifiers::SessionId;

use super::dispatcher::BatchTransport;

// ============================================================================
// Constants
// ============================================================================

/// Per-request timeout for batch posts.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// HttpBatchTransport
// ============================================================================

/// Posts batches as JSON to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpBatchTransport {
    client: Client,
    endpoint: Url,
}

impl HttpBatchTransport {
    /// Creates a transport with its own HTTP client.
    ///
    /// # Errors
    ///
    /// [`Error::Url`](crate::Error::Url) if `endpoint` does not parse,
    /// [`Error::Http`](crate::Error::Http) if the client cannot be built.
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(client, Url::parse(endpoint)?))
    }

    /// Creates a transport that reuses `client`.
    #[inline]
    #[must_use]
    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Returns the endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl BatchTransport for HttpBatchTransport {
    async fn post(&self, body: Value) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        response.error_for_status()?;
        trace!(%status, endpoint = %self.endpoint, "Batch posted");
        Ok(())
    }

    /// Fires the request on a detached task.
    fn beacon(&self, body: &Value) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            return false;
        };

        let request = self.client.post(self.endpoint.clone()).json(body);
        runtime.spawn(async move {
            if let Err(e) = request.send().await {
                debug!(error = %e, "Beacon request failed");
            }
        });
        true
    }
}

// ============================================================================
// MetricRecord
// ============================================================================

/// One client-observed measurement.
///
/// Serializes flat: extra fields sit next to the fixed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Metric name, e.g. `"lcp"`.
    pub name: String,
    /// Measured value.
    pub value: f64,
    /// Route or view the value was observed on.
    pub route: String,
    /// Session the value belongs to.
    pub session_id: SessionId,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetricRecord {
    /// Creates a record with no extra fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: f64,
        route: impl Into<String>,
        session_id: SessionId,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            route: route.into(),
            session_id,
            extra: Map::new(),
        }
    }

    /// Adds an extra field.
    #[inline]
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
