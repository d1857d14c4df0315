//! Build the internal `Node` tree from a raw VSS JSON document, and deep
//! merge overlay documents into it in place.
//!
//! Grounded on `OverlayLoader.cpp`'s `applyOverlays` (filename-sorted
//! directory scan feeding `updateJsonTree` one file at a time) — the merge
//! semantics here are what `updateJsonTree` implements: overlapping leaves
//! are replaced wholesale, overlapping branches are merged recursively, and
//! new subtrees are simply added.

use serde_json::{Map, Value as Json};
use vss_types::{Branch, Datatype, Leaf, LeafMeta, LeafType, Node, VssError};

fn leaf_type_from_str(s: &str) -> Option<LeafType> {
    match s {
        "attribute" => Some(LeafType::Attribute),
        "sensor" => Some(LeafType::Sensor),
        "actuator" => Some(LeafType::Actuator),
        _ => None,
    }
}

fn leaf_type_str(t: LeafType) -> &'static str {
    match t {
        LeafType::Attribute => "attribute",
        LeafType::Sensor => "sensor",
        LeafType::Actuator => "actuator",
    }
}

fn build_leaf(obj: &Map<String, Json>, path_for_error: &str) -> Result<Leaf, VssError> {
    let datatype_str = obj
        .get("datatype")
        .and_then(Json::as_str)
        .ok_or_else(|| VssError::SchemaError(format!("{path_for_error}: missing datatype")))?;
    let datatype = Datatype::parse(datatype_str)
        .ok_or_else(|| VssError::SchemaError(format!("{path_for_error}: unknown datatype {datatype_str}")))?;
    let type_str = obj
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| VssError::SchemaError(format!("{path_for_error}: missing type")))?;
    let leaf_type = leaf_type_from_str(type_str)
        .ok_or_else(|| VssError::SchemaError(format!("{path_for_error}: unknown type {type_str}")))?;

    let meta = LeafMeta {
        min: obj.get("min").and_then(Json::as_f64),
        max: obj.get("max").and_then(Json::as_f64),
        unit: obj.get("unit").and_then(Json::as_str).map(str::to_owned),
        enum_values: obj.get("enum").and_then(Json::as_array).map(|values| {
            values
                .iter()
                .filter_map(Json::as_str)
                .map(str::to_owned)
                .collect()
        }),
        description: obj
            .get("description")
            .and_then(Json::as_str)
            .map(str::to_owned),
    };

    Ok(Leaf {
        datatype,
        leaf_type,
        meta,
        value: None,
        target_value: None,
    })
}

/// Recursively convert a VSS JSON map (`name -> node object`) into `Node`
/// children, in the order the keys appear in the source document.
fn build_children(obj: &Map<String, Json>, prefix: &str) -> Result<Vec<(String, Node)>, VssError> {
    let mut children = Vec::with_capacity(obj.len());
    for (name, value) in obj {
        let node_obj = value
            .as_object()
            .ok_or_else(|| VssError::SchemaError(format!("{prefix}{name}: expected an object")))?;
        let full_path = format!("{prefix}{name}");
        let node = if let Some(inner) = node_obj.get("children").and_then(Json::as_object) {
            Node::Branch(Branch {
                description: node_obj
                    .get("description")
                    .and_then(Json::as_str)
                    .map(str::to_owned),
                children: build_children(inner, &format!("{full_path}/"))?,
            })
        } else {
            Node::Leaf(build_leaf(node_obj, &full_path)?)
        };
        children.push((name.clone(), node));
    }
    Ok(children)
}

/// Parse a whole base tree document into a synthetic root `Branch` whose
/// children are the document's top-level keys.
pub fn parse_tree(document: &Json) -> Result<Branch, VssError> {
    let obj = document
        .as_object()
        .ok_or_else(|| VssError::SchemaError("tree document must be a JSON object".into()))?;
    Ok(Branch {
        description: None,
        children: build_children(obj, "")?,
    })
}

/// Merge an overlay document into `root` in place.
pub fn merge_overlay(root: &mut Branch, overlay: &Json) -> Result<(), VssError> {
    let obj = overlay
        .as_object()
        .ok_or_else(|| VssError::SchemaError("overlay document must be a JSON object".into()))?;
    merge_children(&mut root.children, obj, "")
}

fn merge_children(
    children: &mut Vec<(String, Node)>,
    overlay: &Map<String, Json>,
    prefix: &str,
) -> Result<(), VssError> {
    for (name, overlay_value) in overlay {
        let overlay_obj = overlay_value
            .as_object()
            .ok_or_else(|| VssError::SchemaError(format!("{prefix}{name}: expected an object")))?;
        let full_path = format!("{prefix}{name}");
        let existing = children.iter_mut().find(|(n, _)| n == name);

        let overlay_is_branch = overlay_obj.get("children").and_then(Json::as_object).is_some();

        match (existing, overlay_is_branch) {
            (Some((_, Node::Branch(existing_branch))), true) => {
                let inner = overlay_obj.get("children").and_then(Json::as_object).unwrap();
                merge_children(&mut existing_branch.children, inner, &format!("{full_path}/"))?;
                if let Some(desc) = overlay_obj.get("description").and_then(Json::as_str) {
                    existing_branch.description = Some(desc.to_owned());
                }
            }
            (Some((_, Node::Leaf(existing_leaf))), false) => {
                merge_leaf_fields(existing_leaf, overlay_obj, &full_path)?;
            }
            (Some((_, existing_node)), _) => {
                *existing_node = build_node(overlay_obj, &full_path)?;
            }
            (None, _) => {
                children.push((name.clone(), build_node(overlay_obj, &full_path)?));
            }
        }
    }
    Ok(())
}

/// Merge an overlay object's own fields into an existing leaf, key by key:
/// a field present in the overlay replaces the leaf's current value, a field
/// it omits is left untouched. Lets a partial overlay (e.g. just `{"unit":
/// "km/h"}`) patch one attribute of a leaf without redeclaring `type`/
/// `datatype`, unlike `build_leaf` which requires both.
fn merge_leaf_fields(leaf: &mut Leaf, obj: &Map<String, Json>, path_for_error: &str) -> Result<(), VssError> {
    if let Some(datatype_str) = obj.get("datatype").and_then(Json::as_str) {
        leaf.datatype = Datatype::parse(datatype_str)
            .ok_or_else(|| VssError::SchemaError(format!("{path_for_error}: unknown datatype {datatype_str}")))?;
    }
    if let Some(type_str) = obj.get("type").and_then(Json::as_str) {
        leaf.leaf_type = leaf_type_from_str(type_str)
            .ok_or_else(|| VssError::SchemaError(format!("{path_for_error}: unknown type {type_str}")))?;
    }
    if let Some(min) = obj.get("min").and_then(Json::as_f64) {
        leaf.meta.min = Some(min);
    }
    if let Some(max) = obj.get("max").and_then(Json::as_f64) {
        leaf.meta.max = Some(max);
    }
    if let Some(unit) = obj.get("unit").and_then(Json::as_str) {
        leaf.meta.unit = Some(unit.to_owned());
    }
    if let Some(values) = obj.get("enum").and_then(Json::as_array) {
        leaf.meta.enum_values = Some(values.iter().filter_map(Json::as_str).map(str::to_owned).collect());
    }
    if let Some(description) = obj.get("description").and_then(Json::as_str) {
        leaf.meta.description = Some(description.to_owned());
    }
    Ok(())
}

fn build_node(obj: &Map<String, Json>, full_path: &str) -> Result<Node, VssError> {
    if let Some(inner) = obj.get("children").and_then(Json::as_object) {
        Ok(Node::Branch(Branch {
            description: obj.get("description").and_then(Json::as_str).map(str::to_owned),
            children: build_children(inner, &format!("{full_path}/"))?,
        }))
    } else {
        Ok(Node::Leaf(build_leaf(obj, full_path)?))
    }
}

/// Recover `(Datatype, LeafMeta)` from a leaf metadata JSON object, the
/// inverse of [`leaf_metadata_json`]. Used by callers that only have the
/// `TreeBackend::get_metadata` JSON view but need the typed shape to run
/// the sanitizer (e.g. `vss-kernel`'s `set` handler).
pub fn parse_datatype_and_meta(meta: &Json) -> Result<(Datatype, LeafMeta), VssError> {
    let obj = meta
        .as_object()
        .ok_or_else(|| VssError::SchemaError("metadata must be a JSON object".into()))?;
    let datatype_str = obj
        .get("datatype")
        .and_then(Json::as_str)
        .ok_or_else(|| VssError::SchemaError("metadata missing datatype".into()))?;
    let datatype = Datatype::parse(datatype_str)
        .ok_or_else(|| VssError::SchemaError(format!("unknown datatype {datatype_str}")))?;
    let leaf_meta = LeafMeta {
        min: obj.get("min").and_then(Json::as_f64),
        max: obj.get("max").and_then(Json::as_f64),
        unit: obj.get("unit").and_then(Json::as_str).map(str::to_owned),
        enum_values: obj.get("enum").and_then(Json::as_array).map(|values| {
            values.iter().filter_map(Json::as_str).map(str::to_owned).collect()
        }),
        description: obj.get("description").and_then(Json::as_str).map(str::to_owned),
    };
    Ok((datatype, leaf_meta))
}

/// Serialize a leaf's static metadata back to the wire shape `getMetadata`
/// responds with.
pub fn leaf_metadata_json(leaf: &Leaf) -> Json {
    let mut obj = Map::new();
    obj.insert("type".into(), Json::String(leaf_type_str(leaf.leaf_type).into()));
    obj.insert("datatype".into(), Json::String(leaf.datatype.to_wire_string()));
    if let Some(min) = leaf.meta.min {
        obj.insert("min".into(), serde_json::json!(min));
    }
    if let Some(max) = leaf.meta.max {
        obj.insert("max".into(), serde_json::json!(max));
    }
    if let Some(unit) = &leaf.meta.unit {
        obj.insert("unit".into(), Json::String(unit.clone()));
    }
    if let Some(values) = &leaf.meta.enum_values {
        obj.insert("enum".into(), serde_json::json!(values));
    }
    if let Some(description) = &leaf.meta.description {
        obj.insert("description".into(), Json::String(description.clone()));
    }
    Json::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn speed_tree() -> Json {
        json!({
            "Vehicle": {
                "type": "branch",
                "children": {
                    "Speed": {
                        "type": "sensor",
                        "datatype": "float",
                        "unit": "km/h"
                    }
                }
            }
        })
    }

    #[test]
    fn parses_nested_tree() {
        let root = parse_tree(&speed_tree()).unwrap();
        let Node::Branch(vehicle) = root.child("Vehicle").unwrap() else {
            panic!("expected branch")
        };
        assert!(matches!(vehicle.child("Speed"), Some(Node::Leaf(_))));
    }

    #[test]
    fn overlay_adds_new_leaf() {
        let mut root = parse_tree(&speed_tree()).unwrap();
        let overlay = json!({
            "Vehicle": {
                "type": "branch",
                "children": {
                    "Cabin": {
                        "type": "branch",
                        "children": {
                            "Door": { "type": "actuator", "datatype": "boolean" }
                        }
                    }
                }
            }
        });
        merge_overlay(&mut root, &overlay).unwrap();
        let Node::Branch(vehicle) = root.child("Vehicle").unwrap() else {
            panic!("expected branch")
        };
        assert!(vehicle.child("Speed").is_some());
        assert!(vehicle.child("Cabin").is_some());
    }

    #[test]
    fn partial_overlay_merges_one_field_without_redeclaring_the_leaf() {
        let mut root = parse_tree(&speed_tree()).unwrap();
        let overlay = json!({
            "Vehicle": {
                "type": "branch",
                "children": {
                    "Speed": { "unit": "mph" }
                }
            }
        });
        merge_overlay(&mut root, &overlay).unwrap();
        let Node::Branch(vehicle) = root.child("Vehicle").unwrap() else {
            panic!("expected branch")
        };
        let Node::Leaf(speed) = vehicle.child("Speed").unwrap() else {
            panic!("expected leaf")
        };
        assert_eq!(speed.meta.unit.as_deref(), Some("mph"));
        assert_eq!(speed.datatype, Datatype::parse("float").unwrap());
    }

    #[test]
    fn overlay_replaces_conflicting_leaf() {
        let mut root = parse_tree(&speed_tree()).unwrap();
        let overlay = json!({
            "Vehicle": {
                "type": "branch",
                "children": {
                    "Speed": { "type": "sensor", "datatype": "double", "unit": "mph" }
                }
            }
        });
        merge_overlay(&mut root, &overlay).unwrap();
        let Node::Branch(vehicle) = root.child("Vehicle").unwrap() else {
            panic!("expected branch")
        };
        let Node::Leaf(speed) = vehicle.child("Speed").unwrap() else {
            panic!("expected leaf")
        };
        assert_eq!(speed.meta.unit.as_deref(), Some("mph"));
    }
}
