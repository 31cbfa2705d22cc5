//! Reconnect backoff policy.
//!
//! Pure mapping from attempt number to wait time. Attempts are numbered
//! from 1; attempt 0 means "connected, nothing to wait for".

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// BackoffKind
// ============================================================================

/// Shape of the backoff curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// `base * attempt`.
    #[default]
    Linear,
    /// `base * 2^(attempt - 1)`.
    Exponential,
}

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Capped, deterministic reconnect delays with a bounded attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
    kind: BackoffKind,
}

impl ReconnectPolicy {
    /// Creates a policy.
    ///
    /// A `cap` below `base` is raised to `base`.
    #[must_use]
    pub fn new(base: Duration, cap: Duration, max_attempts: u32, kind: BackoffKind) -> Self {
        Self {
            base,
            cap: cap.max(base),
            max_attempts,
            kind,
        }
    }

    /// Returns the wait before `attempt`.
    ///
    /// Monotonically non-decreasing in `attempt` and never above the cap.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let raw = match self.kind {
            BackoffKind::Linear => self.base.saturating_mul(attempt),
            BackoffKind::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base.saturating_mul(factor)
            }
        };

        raw.min(self.cap)
    }

    /// Returns `true` if `attempt` is within the budget.
    #[inline]
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }

    /// Returns the attempt budget.
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay ceiling.
    #[inline]
    #[must_use]
    pub fn cap(&self) -> Duration {
        self.cap
    }
}

// ============================================================================
// Tests
// ============================================================================
