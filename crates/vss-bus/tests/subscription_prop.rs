use proptest::prelude::*;
use serde_json::json;
use uuid::Uuid;
use vss_bus::SubscriptionRegistry;
use vss_types::{Attribute, RuntimeValue};

proptest! {
    /// Subscription liveness: every successful write to a
    /// subscribed leaf produces exactly one notification per subscription
    /// until unsubscribe, and redundant writes (same value as last time)
    /// produce no notification.
    #[test]
    fn deliveries_match_distinct_value_changes(values in prop::collection::vec(0i64..5, 1..20)) {
        let registry = SubscriptionRegistry::new();
        let channel_id = Uuid::new_v4();
        let (_id, rx) = registry.subscribe(channel_id, "Vehicle/Speed", Attribute::Value);

        let mut expected = Vec::new();
        let mut last = None;
        for v in &values {
            registry.notify("Vehicle/Speed", Attribute::Value, &RuntimeValue { data: json!(v), timestamp_ms: 0 });
            if last != Some(*v) {
                expected.push(*v);
            }
            last = Some(*v);
        }

        let delivered: Vec<i64> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|n| n.value.data.as_i64().unwrap())
            .collect();
        prop_assert_eq!(delivered, expected);
    }
}
