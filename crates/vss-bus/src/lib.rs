#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vss-bus** – subscription registry and fanout engine for the VSS signal
//! server (C7).
//!
//! Unlike a general broadcast bus this is a *targeted* fanout: each
//! subscription watches exactly one leaf path + attribute, and `notify` only
//! wakes the subscriptions registered against the path that changed. Per the
//! concurrency model the registry lock is always acquired *inside* the
//! tree-store write lock, so a subscriber can never observe a notification
//! whose snapshot predates the store state it would read right after.

use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use serde_json::Value as Json;
use uuid::Uuid;
use vss_types::{Attribute, RuntimeValue, Subscription};

/// One delivered notification: the path/attribute that changed and its new
/// runtime value.
#[derive(Debug, Clone)]
pub struct Notification {
    pub subscription_id: Uuid,
    pub path: String,
    pub attribute: Attribute,
    pub value: RuntimeValue,
}

/// Errors raised by the registry.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("no subscription with id {0}")]
    UnknownSubscription(Uuid),
}

struct Entry {
    subscription: Subscription,
    sender: Sender<Notification>,
    /// The last value delivered to this subscription, so a write that
    /// doesn't change the value produces no redundant notification.
    last_delivered: Option<Json>,
}

/// Per-client subscription registry keyed by subscription id, with a
/// leaf-path reverse index so `notify` doesn't have to scan every live
/// subscription on every write, and a channel-id reverse index so
/// `close_channel` doesn't have to scan either.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<Uuid, Entry>>,
    by_path: Mutex<HashMap<String, Vec<Uuid>>>,
    by_channel: Mutex<HashMap<Uuid, Vec<Uuid>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new watch on `leaf_path`/`attribute`, returning its id and
    /// the receiving half of its notification channel.
    pub fn subscribe(
        &self,
        channel_id: Uuid,
        leaf_path: &str,
        attribute: Attribute,
    ) -> (Uuid, Receiver<Notification>) {
        let id = Uuid::new_v4();
        let (tx, rx) = channel();
        let subscription = Subscription {
            id,
            channel_id,
            leaf_path: leaf_path.to_owned(),
            attribute,
        };
        self.entries.lock().expect("registry lock poisoned").insert(
            id,
            Entry {
                subscription,
                sender: tx,
                last_delivered: None,
            },
        );
        self.by_path
            .lock()
            .expect("registry lock poisoned")
            .entry(leaf_path.to_owned())
            .or_default()
            .push(id);
        self.by_channel
            .lock()
            .expect("registry lock poisoned")
            .entry(channel_id)
            .or_default()
            .push(id);
        tracing::debug!(subscription = %id, path = leaf_path, "subscription registered");
        (id, rx)
    }

    /// Tear down a subscription. Idempotent: unsubscribing an id that is
    /// already gone (e.g. the channel disconnected first) is not an error,
    /// matching the original unsubscribe handler's "already removed" success
    /// path.
    pub fn unsubscribe(&self, id: Uuid) {
        let removed = self
            .entries
            .lock()
            .expect("registry lock poisoned")
            .remove(&id);
        if let Some(entry) = removed {
            if let Some(ids) = self
                .by_path
                .lock()
                .expect("registry lock poisoned")
                .get_mut(&entry.subscription.leaf_path)
            {
                ids.retain(|sub_id| *sub_id != id);
            }
            if let Some(ids) = self
                .by_channel
                .lock()
                .expect("registry lock poisoned")
                .get_mut(&entry.subscription.channel_id)
            {
                ids.retain(|sub_id| *sub_id != id);
            }
            tracing::debug!(subscription = %id, "subscription removed");
        }
    }

    /// Tear down every subscription owned by `channel_id`, per the registry's
    /// "channel close implicitly unsubscribes all of that channel's ids"
    /// contract. A transport with a persistent per-connection channel calls
    /// this once the connection drops; idempotent like `unsubscribe` if
    /// called on a channel with no live subscriptions.
    pub fn close_channel(&self, channel_id: Uuid) {
        let ids = self
            .by_channel
            .lock()
            .expect("registry lock poisoned")
            .remove(&channel_id)
            .unwrap_or_default();
        for id in ids {
            self.unsubscribe(id);
        }
    }

    /// Deliver `value` to every live subscription watching `leaf_path` +
    /// `attribute`, skipping subscriptions whose last delivered value is
    /// unchanged: a redundant write produces no notification.
    /// Call this while still holding the tree-store write lock so
    /// subscribers never race ahead of the state they'd read back.
    /// Disconnected receivers (dropped `Receiver`) are pruned as they're
    /// found rather than treated as an error.
    pub fn notify(&self, leaf_path: &str, attribute: Attribute, value: &RuntimeValue) {
        let ids = {
            let by_path = self.by_path.lock().expect("registry lock poisoned");
            match by_path.get(leaf_path) {
                Some(ids) => ids.clone(),
                None => return,
            }
        };

        let mut entries = self.entries.lock().expect("registry lock poisoned");
        let mut stale = Vec::new();
        for id in ids {
            let Some(entry) = entries.get_mut(&id) else { continue };
            if entry.subscription.attribute != attribute {
                continue;
            }
            if entry.last_delivered.as_ref() == Some(&value.data) {
                continue;
            }
            let notification = Notification {
                subscription_id: id,
                path: leaf_path.to_owned(),
                attribute,
                value: value.clone(),
            };
            if entry.sender.send(notification).is_err() {
                stale.push(id);
            } else {
                entry.last_delivered = Some(value.data.clone());
            }
        }
        for id in stale {
            entries.remove(&id);
        }
    }

    /// Number of live subscriptions, for diagnostics.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry lock poisoned").len()
    }

    /// `true` if there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(n: i64) -> RuntimeValue {
        RuntimeValue {
            data: json!(n),
            timestamp_ms: 0,
        }
    }

    #[test]
    fn subscribe_then_notify_delivers() {
        let registry = SubscriptionRegistry::new();
        let channel_id = Uuid::new_v4();
        let (_id, rx) = registry.subscribe(channel_id, "Vehicle/Speed", Attribute::Value);

        registry.notify("Vehicle/Speed", Attribute::Value, &value(42));

        let notification = rx.recv().unwrap();
        assert_eq!(notification.path, "Vehicle/Speed");
        assert_eq!(notification.value.data, json!(42));
    }

    #[test]
    fn notify_skips_other_attribute() {
        let registry = SubscriptionRegistry::new();
        let channel_id = Uuid::new_v4();
        let (_id, rx) = registry.subscribe(channel_id, "Vehicle/Speed", Attribute::TargetValue);

        registry.notify("Vehicle/Speed", Attribute::Value, &value(1));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let channel_id = Uuid::new_v4();
        let (id, _rx) = registry.subscribe(channel_id, "Vehicle/Speed", Attribute::Value);

        registry.unsubscribe(id);
        assert_eq!(registry.len(), 0);
        registry.unsubscribe(id); // no panic, no error
    }

    #[test]
    fn repeated_identical_value_is_not_redelivered() {
        let registry = SubscriptionRegistry::new();
        let channel_id = Uuid::new_v4();
        let (_id, rx) = registry.subscribe(channel_id, "Vehicle/Speed", Attribute::Value);

        registry.notify("Vehicle/Speed", Attribute::Value, &value(42));
        registry.notify("Vehicle/Speed", Attribute::Value, &value(42));
        registry.notify("Vehicle/Speed", Attribute::Value, &value(43));

        assert_eq!(rx.try_recv().unwrap().value.data, json!(42));
        assert_eq!(rx.try_recv().unwrap().value.data, json!(43));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = SubscriptionRegistry::new();
        let channel_id = Uuid::new_v4();
        let (id, rx) = registry.subscribe(channel_id, "Vehicle/Speed", Attribute::Value);
        registry.unsubscribe(id);

        registry.notify("Vehicle/Speed", Attribute::Value, &value(7));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn close_channel_tears_down_all_of_its_subscriptions() {
        let registry = SubscriptionRegistry::new();
        let channel_id = Uuid::new_v4();
        let other_channel_id = Uuid::new_v4();
        let (_id1, rx1) = registry.subscribe(channel_id, "Vehicle/Speed", Attribute::Value);
        let (_id2, rx2) = registry.subscribe(channel_id, "Vehicle/Cabin/Seat/Position", Attribute::Value);
        let (_id3, rx3) = registry.subscribe(other_channel_id, "Vehicle/Speed", Attribute::Value);

        registry.close_channel(channel_id);
        assert_eq!(registry.len(), 1);

        registry.notify("Vehicle/Speed", Attribute::Value, &value(1));
        registry.notify("Vehicle/Cabin/Seat/Position", Attribute::Value, &value(2));

        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_err());
        assert_eq!(rx3.try_recv().unwrap().value.data, json!(1));
    }

    #[test]
    fn close_channel_on_one_with_no_subscriptions_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        registry.close_channel(Uuid::new_v4()); // no panic, no error
        assert_eq!(registry.len(), 0);
    }
}
