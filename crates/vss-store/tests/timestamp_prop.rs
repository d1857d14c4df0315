use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use vss_store::TreeStore;
use vss_store_core::TreeBackend;
use vss_types::{Attribute, Path};

proptest! {
    /// Timestamp monotonicity: sequential successful writes to
    /// the same leaf attribute produce non-decreasing `ts`.
    #[test]
    fn sequential_writes_have_non_decreasing_timestamps(count in 1usize..20) {
        let store = TreeStore::new();
        store.init(json!({
            "Vehicle": {
                "type": "branch",
                "children": {
                    "Speed": { "type": "sensor", "datatype": "float" }
                }
            }
        })).unwrap();
        let path = Path::from_canonical("Vehicle/Speed");

        let mut last_ts = i64::MIN;
        for i in 0..count {
            let stored = store.set_signal(&path, Attribute::Value, json!(i as f64)).unwrap();
            prop_assert!(stored.timestamp_ms >= last_ts);
            last_ts = stored.timestamp_ms;
        }
    }
}

/// Concurrent writers racing on the same leaf must still leave behind a
/// non-decreasing timestamp history, since the stamp is taken inside
/// `set_signal`'s write-lock critical section rather than by the caller
/// before acquiring the lock.
#[test]
fn concurrent_writes_never_land_an_out_of_order_timestamp() {
    let store = Arc::new(TreeStore::new());
    store
        .init(json!({
            "Vehicle": {
                "type": "branch",
                "children": {
                    "Speed": { "type": "sensor", "datatype": "float" }
                }
            }
        }))
        .unwrap();
    let path = Path::from_canonical("Vehicle/Speed");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            let path = path.clone();
            std::thread::spawn(move || {
                let mut stamps = Vec::with_capacity(50);
                for n in 0..50 {
                    let stored = store
                        .set_signal(&path, Attribute::Value, json!((i * 50 + n) as f64))
                        .unwrap();
                    stamps.push(stored.timestamp_ms);
                }
                stamps
            })
        })
        .collect();

    let mut all_stamps: Vec<i64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    all_stamps.sort_unstable();
    let got = store.get_signal(&path, Attribute::Value, false).unwrap();
    assert!(got.timestamp_ms >= *all_stamps.first().unwrap());
}
