use proptest::prelude::*;
use serde_json::json;
use vss_store::sanitize_value;
use vss_types::{Datatype, LeafMeta};

proptest! {
    /// Sanitizer soundness for `uint8`'s native bit-width bounds:
    /// accepted iff representable in `[0, 255]`.
    #[test]
    fn uint8_soundness(n in any::<i64>()) {
        let dt = Datatype::parse("uint8").unwrap();
        let meta = LeafMeta::default();
        let result = sanitize_value(dt, &meta, &json!(n), "p");
        let in_range = (0..=255).contains(&n);
        prop_assert_eq!(result.is_ok(), in_range);
    }

    /// Sanitizer soundness for a leaf-declared `[min, max]`
    /// narrower than the datatype's native bounds.
    #[test]
    fn declared_bounds_are_enforced(n in -1000i64..1000i64, min in -500i64..0i64, max in 1i64..500i64) {
        let dt = Datatype::parse("int32").unwrap();
        let mut meta = LeafMeta::default();
        meta.min = Some(min as f64);
        meta.max = Some(max as f64);
        let result = sanitize_value(dt, &meta, &json!(n), "p");
        let expected = n >= min && n <= max;
        prop_assert_eq!(result.is_ok(), expected);
    }

    /// String-encoded integers coerce the same way native JSON numbers do.
    #[test]
    fn string_encoded_integer_matches_native(n in 0i64..=255i64) {
        let dt = Datatype::parse("uint8").unwrap();
        let meta = LeafMeta::default();
        let from_string = sanitize_value(dt, &meta, &json!(n.to_string()), "p").unwrap();
        let from_native = sanitize_value(dt, &meta, &json!(n), "p").unwrap();
        prop_assert_eq!(from_string, from_native);
    }
}
