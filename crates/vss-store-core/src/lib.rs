#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vss-store-core** – the `TreeBackend` trait shared by any tree storage
//! driver.
//!
//! Unlike an event-sourced log, a VSS tree document is mutated in place: a
//! `set` overwrites a leaf's runtime slot, an overlay merge replaces or adds
//! subtrees. There is no write-ahead log or causal hash chain here — a
//! signal server is explicitly non-durable (no cross-restart persistence),
//! so the abstraction only needs to describe "read/write the current tree",
//! not "replay history".
//!
//! All methods are synchronous: the concurrency model for this server has no
//! suspension points inside the core, only a transport thread pool calling
//! in and out.

use serde_json::Value as Json;
use vss_types::{Attribute, Path, RuntimeValue, VssError};

/// Abstraction over a tree document storage driver.
///
/// Implementations must be internally synchronized (`Send + Sync`) since
/// multiple transport threads call through the same backend concurrently;
/// the contract does not mandate *how* (a single `RwLock`-guarded document,
/// sharded locks, etc.), only that callers never need `&mut self`.
pub trait TreeBackend: Send + Sync {
    /// Load a base tree document, replacing whatever is currently held.
    /// Called once at startup.
    fn init(&self, tree: Json) -> Result<(), VssError>;

    /// Deep-merge an overlay document into the current tree: overlapping
    /// leaves are replaced, overlapping branches are merged recursively, and
    /// new subtrees are added. Applied in filename order at startup, after
    /// `init`.
    fn apply_overlay(&self, overlay: Json) -> Result<(), VssError>;

    /// `true` if `path` (no wildcards) resolves to any node, branch or leaf.
    fn path_exists(&self, path: &Path) -> bool;

    /// `true` if `path` resolves to a leaf whose `attribute` slot accepts
    /// writes (sensors and actuators for `value`, actuators only for
    /// `targetValue`).
    fn path_is_writable(&self, path: &Path, attribute: Attribute) -> bool;

    /// `true` if `path` resolves to a leaf for which `attribute` is a legal
    /// slot at all, independent of write permission. `get`/`getMetadata` use
    /// this in addition to capability checks: a sensor's `targetValue` is
    /// never attributable, authorized or not.
    fn path_is_attributable(&self, path: &Path, attribute: Attribute) -> bool;

    /// Expand `path` (which may contain `*` wildcard segments) into the
    /// concrete leaf paths it matches, in tree traversal order.
    fn get_leaf_paths(&self, path: &Path) -> Vec<Path>;

    /// Fetch a leaf's static metadata (datatype, bounds, unit, enum,
    /// description) as a JSON object.
    fn get_metadata(&self, path: &Path) -> Result<Json, VssError>;

    /// Replace a leaf's static metadata in place.
    fn update_metadata(&self, path: &Path, metadata: Json) -> Result<(), VssError>;

    /// Write already-sanitized `data` into `path`'s `attribute` slot,
    /// stamping the wall-clock timestamp while the write lock is held so
    /// concurrent writers can never land an out-of-order timestamp, and
    /// returning the stored value for the caller to notify subscribers with.
    fn set_signal(
        &self,
        path: &Path,
        attribute: Attribute,
        data: Json,
    ) -> Result<RuntimeValue, VssError>;

    /// Read `path`'s `attribute` slot. Returns `VssError::NotSet` if the
    /// leaf exists and the attribute is legal but no value has ever been
    /// written. `as_string` converts numeric datatypes to their decimal
    /// string form, used by a WS transport that needs bit-exact JSON.
    fn get_signal(&self, path: &Path, attribute: Attribute, as_string: bool) -> Result<RuntimeValue, VssError>;
}

#[cfg(test)]
mod tests {
    // `TreeBackend` is exercised through its concrete implementation in
    // `vss-store`; this crate only hosts the trait.
}
