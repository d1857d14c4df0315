use proptest::prelude::*;
use vss_types::{Origin, Path};

fn segment() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9]{0,7}"
}

proptest! {
    /// `from_vss(x).to_string() = x` for any well-formed input.
    #[test]
    fn canonical_path_round_trips(segments in prop::collection::vec(segment(), 1..5)) {
        let canonical = segments.join("/");
        let path = Path::from_vss(&canonical);
        prop_assert_eq!(path.to_string(), canonical);
    }

    /// `to_json_path` followed by `from_json_path` returns the
    /// same canonical path.
    #[test]
    fn json_path_round_trips(segments in prop::collection::vec(segment(), 1..5)) {
        let path = Path::from_canonical(&segments.join("/"));
        let back = Path::from_json_path(&path.to_json_path(), Origin::Gen2);
        prop_assert_eq!(back.canonical(), path.canonical());
    }
}
