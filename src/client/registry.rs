//! Subscriber registry.
//!
//! Tracks live subscriptions, the union of their topics, and fans
//! messages out to matching handlers. Owned by the connection manager
//! task; the registry itself never touches the connection. Each mutation
//! returns a [`Change`] describing what the manager must do about it.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::identifiers::SubscriptionId;
use crate::protocol::Message;

// ============================================================================
// Types
// ============================================================================

/// Subscriber callback.
///
/// Runs on the manager task for every matching message; must not block.
/// A panic is caught and reported; the subscription stays registered.
pub type MessageHandler = Box<dyn Fn(&Message) + Send + Sync>;

// ============================================================================
// Subscription
// ============================================================================

/// One logical subscriber.
pub struct Subscription {
    /// Stable identity across reconnects.
    pub id: SubscriptionId,
    /// Topics of interest.
    pub topics: BTreeSet<String>,
    handler: MessageHandler,
}

impl Subscription {
    /// Creates a subscription.
    #[must_use]
    pub fn new(id: SubscriptionId, topics: BTreeSet<String>, handler: MessageHandler) -> Self {
        Self {
            id,
            topics,
            handler,
        }
    }

    /// Returns `true` if the subscription wants `topic`.
    #[inline]
    #[must_use]
    pub fn matches(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topics", &self.topics)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Change
// ============================================================================

/// Effect of a registry mutation on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Nothing to do.
    None,
    /// Reference count went 0 → 1.
    FirstSubscriber,
    /// Topic union grew; carries the full new union.
    TopicsAdded(BTreeSet<String>),
    /// Topic union shrank; carries only the removed topics.
    TopicsRemoved(BTreeSet<String>),
    /// Reference count went 1 → 0.
    LastSubscriberGone,
}

// ============================================================================
// Dispatch
// ============================================================================

/// Outcome of delivering one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Handlers that returned normally.
    pub delivered: usize,
    /// Subscriptions whose handler panicked.
    pub panicked: Vec<SubscriptionId>,
}

// ============================================================================
// SubscriberRegistry
// ============================================================================

/// Reference-counted set of subscriptions.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscriptions: FxHashMap<SubscriptionId, Subscription>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live subscriptions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns `true` if no subscriptions are live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns `true` if `id` is live.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscriptions.contains_key(&id)
    }

    /// Returns the union of all live topics, sorted.
    #[must_use]
    pub fn topics(&self) -> BTreeSet<String> {
        self.subscriptions
            .values()
            .flat_map(|sub| sub.topics.iter().cloned())
            .collect()
    }

    /// Adds a subscription.
    ///
    /// Re-inserting a live id replaces its topics and handler.
    pub fn insert(&mut self, subscription: Subscription) -> Change {
        let before = self.topics();
        let was_empty = self.subscriptions.is_empty();
        self.subscriptions.insert(subscription.id, subscription);

        if was_empty {
            return Change::FirstSubscriber;
        }

        self.diff(&before)
    }

    /// Removes a subscription. Unknown ids are a no-op.
    pub fn remove(&mut self, id: SubscriptionId) -> Change {
        let before = self.topics();

        if self.subscriptions.remove(&id).is_none() {
            trace!(%id, "Unsubscribe for unknown subscription ignored");
            return Change::None;
        }

        if self.subscriptions.is_empty() {
            return Change::LastSubscriberGone;
        }

        self.diff(&before)
    }

    /// Delivers `message` to every matching subscription, once each.
    ///
    /// No order is defined between subscriptions. A panicking handler does
    /// not stop delivery to the others.
    pub fn dispatch(&self, message: &Message) -> Dispatch {
        let mut outcome = Dispatch::default();

        for sub in self.subscriptions.values() {
            if !sub.matches(&message.topic) {
                continue;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| (sub.handler)(message))) {
                Ok(()) => outcome.delivered += 1,
                Err(_) => {
                    warn!(id = %sub.id, topic = %message.topic, "Subscriber handler panicked");
                    outcome.panicked.push(sub.id);
                }
            }
        }

        trace!(
            topic = %message.topic,
            delivered = outcome.delivered,
            panicked = outcome.panicked.len(),
            "Message dispatched"
        );
        outcome
    }

    fn diff(&self, before: &BTreeSet<String>) -> Change {
        let after = self.topics();

        if !after.is_subset(before) {
            return Change::TopicsAdded(after);
        }

        let removed: BTreeSet<String> = before.difference(&after).cloned().collect();
        if removed.is_empty() {
            Change::None
        } else {
            Change::TopicsRemoved(removed)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
