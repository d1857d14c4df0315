#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vss-access** – capability-pattern matching (C5).
//!
//! Grounded on `accesschecker.cpp`'s `checkReadAccess`/`checkWriteAccess`/
//! `checkPathWriteAccess`, generalized from the original's plain string
//! equality to the single-segment `*` wildcard matching the path algebra
//! supports. No glob crate is pulled in for this: a pattern and a path
//! always have the same number of segments (no recursive `**`), so this is
//! a fixed-arity per-segment comparison, not a filesystem glob — a bespoke
//! comparison, the way the original does it, is the idiomatic choice.

use vss_types::{Attribute, Path, PermissionGrant, VssError};

/// `true` if `pattern` matches `path` segment-for-segment, where a pattern
/// segment of `*` matches any single path segment. Pattern and path must
/// have the same number of segments; a pattern is never a path prefix.
pub fn pattern_matches(pattern: &str, path: &Path) -> bool {
    let pattern_path = Path::from_vss(pattern);
    let pattern_segments = pattern_path.segments();
    let path_segments = path.segments();
    if pattern_segments.len() != path_segments.len() {
        return false;
    }
    pattern_segments
        .iter()
        .zip(path_segments.iter())
        .all(|(p, s)| p == "*" || p == s)
}

/// Whether `grants` authorize `attribute`'s access kind (`can_read` for
/// `get`/`subscribe`, `can_write` for `set`) on `path`. The grant list is
/// searched for *any* matching pattern with the right right bit set, as the
/// original `checkReadAccess`/`checkWriteAccess` do by iterating the
/// permissions map.
pub fn is_authorized(grants: &[PermissionGrant], path: &Path, need_write: bool) -> bool {
    grants.iter().any(|grant| {
        let rights_ok = if need_write { grant.can_write } else { grant.can_read };
        rights_ok && pattern_matches(&grant.pattern, path)
    })
}

/// Check access for a single leaf path, returning [`VssError::NoPermission`]
/// on denial.
pub fn check_path(grants: &[PermissionGrant], path: &Path, need_write: bool) -> Result<(), VssError> {
    if is_authorized(grants, path, need_write) {
        Ok(())
    } else {
        Err(VssError::NoPermission(path.to_string()))
    }
}

/// Check access for a batch of leaf paths (the result of wildcard
/// expansion) and require *all* to be authorized — partial authorization of
/// a wildcard request is treated as a full denial, matching
/// `checkPathWriteAccess`'s loop-and-bail behavior over an expanded path
/// set.
pub fn check_paths(grants: &[PermissionGrant], paths: &[Path], need_write: bool) -> Result<(), VssError> {
    for path in paths {
        check_path(grants, path, need_write)?;
    }
    Ok(())
}

/// Convenience wrapper binding the access kind to an [`Attribute`]: reading
/// `targetValue` is still a *read*, writing either slot is a *write*.
pub fn check_attribute(
    grants: &[PermissionGrant],
    path: &Path,
    _attribute: Attribute,
    need_write: bool,
) -> Result<(), VssError> {
    check_path(grants, path, need_write)
}
