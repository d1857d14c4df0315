//! Tree document data model — a branch/leaf sum type with typed runtime
//! attribute slots, modeled internally while keeping the on-wire shape
//! dynamic JSON.

use serde::{Deserialize, Serialize};

/// Datatype declared on a leaf. The `[]` array suffix is tracked separately
/// (`Datatype::array`) rather than as its own enum arm, mirroring
/// `VSSTypeSanitizer.cpp`'s `dt.rfind("[]")` suffix check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scalar {
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Float,
    Double,
    Boolean,
    String,
}

impl Scalar {
    /// Parse the wire spelling used in VSS metadata (e.g. `"uint8"`).
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "uint8" => Self::Uint8,
            "int8" => Self::Int8,
            "uint16" => Self::Uint16,
            "int16" => Self::Int16,
            "uint32" => Self::Uint32,
            "int32" => Self::Int32,
            "uint64" => Self::Uint64,
            "int64" => Self::Int64,
            "float" => Self::Float,
            "double" => Self::Double,
            "boolean" => Self::Boolean,
            "string" => Self::String,
            _ => return None,
        })
    }

    /// Wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Int8 => "int8",
            Self::Uint16 => "uint16",
            Self::Int16 => "int16",
            Self::Uint32 => "uint32",
            Self::Int32 => "int32",
            Self::Uint64 => "uint64",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::String => "string",
        }
    }
}

/// Full datatype, scalar or array-of-scalar (`T[]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datatype {
    pub scalar: Scalar,
    pub is_array: bool,
}

impl Datatype {
    /// Parse a datatype string such as `"float"` or `"uint8[]"`.
    pub fn parse(s: &str) -> Option<Self> {
        if let Some(inner) = s.strip_suffix("[]") {
            Scalar::parse(inner).map(|scalar| Self { scalar, is_array: true })
        } else {
            Scalar::parse(s).map(|scalar| Self { scalar, is_array: false })
        }
    }

    /// Wire spelling (`"float"` or `"uint8[]"`).
    pub fn to_wire_string(&self) -> String {
        if self.is_array {
            format!("{}[]", self.scalar.as_str())
        } else {
            self.scalar.as_str().to_owned()
        }
    }
}

/// Capability tag declared on a leaf: what kind of signal it represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeafType {
    Attribute,
    Sensor,
    Actuator,
}

/// Which runtime slot a get/set/subscribe targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attribute {
    #[serde(rename = "value")]
    Value,
    #[serde(rename = "targetValue")]
    TargetValue,
}

impl Attribute {
    /// Parse the wire spelling, defaulting unknowns to `None` (caller decides
    /// whether the default of `value` applies).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "value" => Some(Self::Value),
            "targetValue" => Some(Self::TargetValue),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::TargetValue => "targetValue",
        }
    }
}

/// A stored runtime value: the data plus the wall-clock millisecond
/// timestamp of the write that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeValue {
    pub data: serde_json::Value,
    pub timestamp_ms: i64,
}

/// Metadata carried on a leaf (everything but the runtime `value`/
/// `targetValue` slots).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafMeta {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub unit: Option<String>,
    #[serde(default)]
    pub enum_values: Option<Vec<String>>,
    pub description: Option<String>,
}

/// One node in the tree document: a branch (has children) or a leaf (has a
/// datatype and runtime attribute slots). Never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Branch(Branch),
    Leaf(Leaf),
}

/// An internal tree node. Children are kept in a `Vec` of `(segment, Node)`
/// pairs rather than a `HashMap` so wildcard expansion preserves insertion
/// order (the tie-break rule), the way the base tree and overlays
/// were originally loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Branch {
    pub description: Option<String>,
    pub children: Vec<(String, Node)>,
}

impl Branch {
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|(n, _)| n == name).map(|(_, node)| node)
    }
}

/// A leaf node: typed, with optional bounds/unit/enum/description and the
/// two runtime attribute slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub datatype: Datatype,
    pub leaf_type: LeafType,
    pub meta: LeafMeta,
    pub value: Option<RuntimeValue>,
    pub target_value: Option<RuntimeValue>,
}

impl Leaf {
    /// `value` is writable only on sensor/actuator leaves.
    pub fn is_writable(&self) -> bool {
        matches!(self.leaf_type, LeafType::Sensor | LeafType::Actuator)
    }

    /// Whether `attribute` is a legal slot for this leaf's type:
    /// `targetValue` only on actuators, `value` on sensor/actuator.
    pub fn supports_attribute(&self, attribute: Attribute) -> bool {
        match attribute {
            Attribute::Value => matches!(self.leaf_type, LeafType::Sensor | LeafType::Actuator),
            Attribute::TargetValue => matches!(self.leaf_type, LeafType::Actuator),
        }
    }

    pub fn slot(&self, attribute: Attribute) -> &Option<RuntimeValue> {
        match attribute {
            Attribute::Value => &self.value,
            Attribute::TargetValue => &self.target_value,
        }
    }

    pub fn slot_mut(&mut self, attribute: Attribute) -> &mut Option<RuntimeValue> {
        match attribute {
            Attribute::Value => &mut self.value,
            Attribute::TargetValue => &mut self.target_value,
        }
    }
}
