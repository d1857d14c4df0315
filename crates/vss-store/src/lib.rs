#![forbid(unsafe_code)]

//! **vss-store** – the in-memory `TreeStore` driver (C3), the type
//! sanitizer (C4), the overlay deep-merge loader, and the CSV recorder
//! decorator.

mod parse;
mod recording;
mod sanitize;

pub use parse::{leaf_metadata_json, merge_overlay, parse_datatype_and_meta, parse_tree};
pub use recording::RecordingTree;
pub use sanitize::sanitize_value;

use std::sync::RwLock;

use chrono::Utc;
use serde_json::Value as Json;
use vss_store_core::TreeBackend;
use vss_types::{Attribute, Branch, Leaf, Node, Path, RuntimeValue, VssError};

/// The in-memory tree document: one root branch, guarded by a single
/// exclusive-writer/shared-reader lock. Per the concurrency model there is
/// exactly one such lock for the whole document — no per-branch sharding —
/// so a `set` and a concurrent wildcard `get` can never observe a torn
/// write.
pub struct TreeStore {
    root: RwLock<Branch>,
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Branch::default()),
        }
    }

    fn resolve<'a>(root: &'a Branch, path: &Path) -> Option<&'a Node> {
        let mut segments = path.segments().iter();
        let first = segments.next()?;
        let mut current = root.child(first)?;
        for segment in segments {
            let Node::Branch(branch) = current else {
                return None;
            };
            current = branch.child(segment)?;
        }
        Some(current)
    }

    fn resolve_mut<'a>(root: &'a mut Branch, path: &Path) -> Option<&'a mut Node> {
        let mut segments = path.segments().iter();
        let first = segments.next()?;
        let mut current = root.child_mut(first)?;
        for segment in segments {
            let Node::Branch(branch) = current else {
                return None;
            };
            current = branch.child_mut(segment)?;
        }
        Some(current)
    }

    fn resolve_leaf<'a>(root: &'a Branch, path: &Path) -> Result<&'a Leaf, VssError> {
        match Self::resolve(root, path) {
            Some(Node::Leaf(leaf)) => Ok(leaf),
            Some(Node::Branch(_)) => Err(VssError::SchemaError(format!(
                "{path}: is a branch, not a leaf"
            ))),
            None => Err(VssError::NoPathFound(path.to_string())),
        }
    }

    /// Recursively collect every leaf path reachable by expanding `*`
    /// wildcard segments, in child-insertion order.
    fn expand(node: &Node, remaining: &[String], prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        match remaining.split_first() {
            None => {
                Self::collect_leaves(node, prefix, out);
            }
            Some((segment, rest)) => {
                let Node::Branch(branch) = node else { return };
                if segment == "*" {
                    for (name, child) in &branch.children {
                        prefix.push(name.clone());
                        Self::expand(child, rest, prefix, out);
                        prefix.pop();
                    }
                } else if let Some(child) = branch.child(segment) {
                    prefix.push(segment.clone());
                    Self::expand(child, rest, prefix, out);
                    prefix.pop();
                }
            }
        }
    }

    /// When a path (possibly after wildcard expansion) lands on a branch
    /// rather than a leaf, flatten every leaf beneath it.
    fn collect_leaves(node: &Node, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        match node {
            Node::Leaf(_) => out.push(prefix.clone()),
            Node::Branch(branch) => {
                for (name, child) in &branch.children {
                    prefix.push(name.clone());
                    Self::collect_leaves(child, prefix, out);
                    prefix.pop();
                }
            }
        }
    }
}

impl TreeBackend for TreeStore {
    fn init(&self, tree: Json) -> Result<(), VssError> {
        let parsed = parse_tree(&tree)?;
        *self.root.write().expect("tree lock poisoned") = parsed;
        Ok(())
    }

    fn apply_overlay(&self, overlay: Json) -> Result<(), VssError> {
        let mut root = self.root.write().expect("tree lock poisoned");
        merge_overlay(&mut root, &overlay)
    }

    fn path_exists(&self, path: &Path) -> bool {
        let root = self.root.read().expect("tree lock poisoned");
        Self::resolve(&root, path).is_some()
    }

    fn path_is_writable(&self, path: &Path, attribute: Attribute) -> bool {
        let root = self.root.read().expect("tree lock poisoned");
        matches!(Self::resolve(&root, path), Some(Node::Leaf(leaf)) if leaf.is_writable() && leaf.supports_attribute(attribute))
    }

    fn path_is_attributable(&self, path: &Path, attribute: Attribute) -> bool {
        let root = self.root.read().expect("tree lock poisoned");
        matches!(Self::resolve(&root, path), Some(Node::Leaf(leaf)) if leaf.supports_attribute(attribute))
    }

    fn get_leaf_paths(&self, path: &Path) -> Vec<Path> {
        let root = self.root.read().expect("tree lock poisoned");
        let synthetic = Node::Branch(root.clone());
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        Self::expand(&synthetic, path.segments(), &mut prefix, &mut out);
        out.into_iter()
            .map(|segments| Path::from_canonical(&segments.join("/")))
            .collect()
    }

    fn get_metadata(&self, path: &Path) -> Result<Json, VssError> {
        let root = self.root.read().expect("tree lock poisoned");
        let leaf = Self::resolve_leaf(&root, path)?;
        Ok(leaf_metadata_json(leaf))
    }

    fn update_metadata(&self, path: &Path, metadata: Json) -> Result<(), VssError> {
        let mut root = self.root.write().expect("tree lock poisoned");
        let node = Self::resolve_mut(&mut root, path)
            .ok_or_else(|| VssError::NoPathFound(path.to_string()))?;
        let Node::Leaf(leaf) = node else {
            return Err(VssError::SchemaError(format!("{path}: is a branch, not a leaf")));
        };
        let obj = metadata
            .as_object()
            .ok_or_else(|| VssError::SchemaError("metadata must be a JSON object".into()))?;

        let mut new_meta = leaf.meta.clone();
        if let Some(min) = obj.get("min").and_then(Json::as_f64) {
            new_meta.min = Some(min);
        }
        if let Some(max) = obj.get("max").and_then(Json::as_f64) {
            new_meta.max = Some(max);
        }
        if let Some(unit) = obj.get("unit").and_then(Json::as_str) {
            new_meta.unit = Some(unit.to_owned());
        }
        if let Some(description) = obj.get("description").and_then(Json::as_str) {
            new_meta.description = Some(description.to_owned());
        }

        let new_datatype = match obj.get("datatype").and_then(Json::as_str) {
            Some(s) => vss_types::Datatype::parse(s)
                .ok_or_else(|| VssError::SchemaError(format!("{path}: unknown datatype {s}")))?,
            None => leaf.datatype,
        };

        // A datatype narrowing must not strand an already-stored value
        // outside its new bounds.
        for slot in [&leaf.value, &leaf.target_value] {
            if let Some(existing) = slot {
                sanitize::sanitize_value(new_datatype, &new_meta, &existing.data, &path.to_string())?;
            }
        }

        leaf.datatype = new_datatype;
        leaf.meta = new_meta;
        Ok(())
    }

    fn set_signal(&self, path: &Path, attribute: Attribute, data: Json) -> Result<RuntimeValue, VssError> {
        let mut root = self.root.write().expect("tree lock poisoned");
        let node = Self::resolve_mut(&mut root, path)
            .ok_or_else(|| VssError::NoPathFound(path.to_string()))?;
        let Node::Leaf(leaf) = node else {
            return Err(VssError::SchemaError(format!("{path}: is a branch, not a leaf")));
        };
        if !leaf.supports_attribute(attribute) {
            return Err(VssError::SchemaError(format!(
                "{path}: {} is not a valid attribute for this leaf",
                attribute.as_str()
            )));
        }
        let value = RuntimeValue {
            data,
            timestamp_ms: now_ms(),
        };
        *leaf.slot_mut(attribute) = Some(value.clone());
        Ok(value)
    }

    fn get_signal(&self, path: &Path, attribute: Attribute, as_string: bool) -> Result<RuntimeValue, VssError> {
        let root = self.root.read().expect("tree lock poisoned");
        let leaf = Self::resolve_leaf(&root, path)?;
        if !leaf.supports_attribute(attribute) {
            return Err(VssError::SchemaError(format!(
                "{path}: {} is not a valid attribute for this leaf",
                attribute.as_str()
            )));
        }
        let mut value = leaf
            .slot(attribute)
            .clone()
            .ok_or_else(|| VssError::NotSet(path.to_string()))?;
        if as_string {
            value.data = stringify_numeric(value.data);
        }
        Ok(value)
    }
}

/// Recursively rewrite JSON numbers as decimal strings, leaving booleans,
/// strings, and everything else untouched. Used by [`TreeStore::get_signal`]
/// when a WS-shaped transport needs bit-exact JSON instead of native typed
/// numbers.
fn stringify_numeric(value: Json) -> Json {
    match value {
        Json::Number(n) => Json::String(n.to_string()),
        Json::Array(items) => Json::Array(items.into_iter().map(stringify_numeric).collect()),
        other => other,
    }
}

/// Current wall-clock time in milliseconds, the timestamp stamped onto
/// every `set_signal` write.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
