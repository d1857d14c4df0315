//! **Path** – canonical VSS path with lossless conversion to the GEN1 dot
//! spelling and the JSONPath projection used to index into the tree document.
//!
//! Mirrors `VSSPath` from the original `kuksa.val-server` (`VSSPath.cpp`):
//! a single in-memory identity carrying three textual spellings plus an
//! origin flag noting which spelling the caller used.

use std::fmt;

/// Which spelling a [`Path`] was originally constructed from.
///
/// Responses echo this back so a GEN1 client sees dot-separated paths and a
/// GEN2 client sees slash-separated ones, matching `VSSPath::to_string()`'s
/// `isGen1Origin() ? getVSSGen1Path() : getVSSPath()` dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Canonical slash-separated spelling (`A/B/C`).
    Gen2,
    /// Legacy dot-separated spelling (`A.B.C`).
    Gen1,
}

/// A VSS path: an ordered sequence of segments, some of which may be the `*`
/// wildcard. Carries both spellings so `to_string()` can echo the one the
/// caller used without re-deriving it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
    origin: Origin,
}

impl Path {
    /// Parse a canonical or dot-form string. A `.` anywhere in the input
    /// selects dot-form (GEN1); otherwise the input is treated as canonical
    /// (GEN2), including the degenerate single-segment case.
    pub fn from_vss(input: &str) -> Self {
        if input.contains('.') {
            Self::from_dot(input)
        } else {
            Self::from_canonical(input)
        }
    }

    /// Parse an explicitly canonical (slash-separated) path.
    pub fn from_canonical(input: &str) -> Self {
        Self {
            segments: input.split('/').map(str::to_owned).collect(),
            origin: Origin::Gen2,
        }
    }

    /// Parse an explicitly dot-separated (GEN1) path.
    pub fn from_dot(input: &str) -> Self {
        Self {
            segments: input.split('.').map(str::to_owned).collect(),
            origin: Origin::Gen1,
        }
    }

    /// Reverse the JSONPath projection: `$['A']['children']['B']` → `A/B`,
    /// `$[*]` → `*`. Mirrors `VSSPath::jsontogen2`'s text surgery: strip
    /// `['children']` markers and quotes, replace `][` with `/`, trim the
    /// leading `$[` and trailing `]`.
    pub fn from_json_path(input: &str, origin: Origin) -> Self {
        let mut s = input.replace("['children']", "");
        s = s.replace('\'', "");
        s = s.replace("][", "/");
        if let Some(rest) = s.strip_prefix("$[") {
            s = rest.to_string();
        }
        if let Some(rest) = s.strip_suffix(']') {
            s = rest.to_string();
        }
        match origin {
            Origin::Gen2 => Self::from_canonical(&s),
            Origin::Gen1 => {
                // The projection itself is always slash-delimited; only the
                // *echoed* spelling depends on origin, so build from
                // canonical and then relabel.
                let mut path = Self::from_canonical(&s);
                path.origin = Origin::Gen1;
                path
            }
        }
    }

    /// Ordered path segments, `*` included verbatim.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// `true` if any segment is the `*` wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| s == "*")
    }

    /// Which spelling this path was parsed from.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Canonical slash-separated spelling, independent of origin.
    pub fn canonical(&self) -> String {
        self.segments.join("/")
    }

    /// GEN1 dot-separated spelling, independent of origin.
    pub fn dot_form(&self) -> String {
        self.segments.join(".")
    }

    /// JSONPath projection: `A/B/C` → `$['A']['children']['B']['children']['C']`,
    /// `*` → `[*]`. Mirrors `VSSPath::gen2tojson`.
    pub fn to_json_path(&self) -> String {
        let mut out = String::from("$");
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push_str("['children']");
            }
            if seg == "*" {
                out.push_str("[*]");
            } else {
                out.push('[');
                out.push('\'');
                out.push_str(seg);
                out.push('\'');
                out.push(']');
            }
        }
        out
    }
}

impl fmt::Display for Path {
    /// Echoes the spelling the caller originally used, mirroring
    /// `VSSPath::to_string()`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            Origin::Gen1 => write!(f, "{}", self.dot_form()),
            Origin::Gen2 => write!(f, "{}", self.canonical()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trip() {
        let p = Path::from_vss("Vehicle/Speed");
        assert_eq!(p.to_string(), "Vehicle/Speed");
        assert_eq!(p.origin(), Origin::Gen2);
    }

    #[test]
    fn dot_form_round_trip() {
        let p = Path::from_vss("Vehicle.Speed");
        assert_eq!(p.to_string(), "Vehicle.Speed");
        assert_eq!(p.origin(), Origin::Gen1);
    }

    #[test]
    fn single_segment_is_canonical() {
        let p = Path::from_vss("Vehicle");
        assert_eq!(p.origin(), Origin::Gen2);
    }

    #[test]
    fn json_path_projection() {
        let p = Path::from_canonical("Vehicle/Cabin/Door");
        assert_eq!(
            p.to_json_path(),
            "$['Vehicle']['children']['Cabin']['children']['Door']"
        );
    }

    #[test]
    fn wildcard_json_path() {
        let p = Path::from_canonical("Vehicle/*");
        assert_eq!(p.to_json_path(), "$['Vehicle']['children'][*]");
        assert!(p.has_wildcard());
    }

    #[test]
    fn json_path_round_trip_canonical() {
        let p = Path::from_canonical("A/B/C");
        let jp = p.to_json_path();
        let back = Path::from_json_path(&jp, Origin::Gen2);
        assert_eq!(back.canonical(), p.canonical());
    }
}
