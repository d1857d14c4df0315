use proptest::prelude::*;
use serde_json::json;
use vss_store::{merge_overlay, parse_tree};

proptest! {
    /// Applying the same overlay twice produces the same tree as
    /// applying it once.
    #[test]
    fn applying_overlay_twice_is_same_as_once(unit in "[a-z]{1,6}") {
        let base = json!({
            "Vehicle": {
                "type": "branch",
                "children": {
                    "Speed": { "type": "sensor", "datatype": "float" }
                }
            }
        });
        let overlay = json!({
            "Vehicle": {
                "type": "branch",
                "children": {
                    "Speed": { "type": "sensor", "datatype": "float", "unit": unit }
                }
            }
        });

        let mut applied_once = parse_tree(&base).unwrap();
        merge_overlay(&mut applied_once, &overlay).unwrap();

        let mut applied_twice = parse_tree(&base).unwrap();
        merge_overlay(&mut applied_twice, &overlay).unwrap();
        merge_overlay(&mut applied_twice, &overlay).unwrap();

        prop_assert_eq!(applied_once, applied_twice);
    }
}
