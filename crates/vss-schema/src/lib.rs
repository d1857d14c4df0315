#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vss-schema** – compiled JSON-schema validators per command shape (C2).
//!
//! Grounded on `VSSRequestJsonSchema.hpp`/`VSSRequestValidator.cpp`'s
//! `validateGet`/`validateSet`/`validateSubscribe`/.../`tryExtractRequestId`,
//! reimplemented against the `jsonschema` crate the way the JSON-schema
//! validation idiom shows up elsewhere in the corpus (compiled-once
//! validators held behind a lazily-initialized static).

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde_json::Value as Json;
use vss_types::VssError;

fn compile(schema_literal: &str) -> JSONSchema {
    let value: Json = serde_json::from_str(schema_literal).expect("schema literal is valid JSON");
    let leaked: &'static Json = Box::leak(Box::new(value));
    JSONSchema::compile(leaked).expect("schema literal is a valid JSON Schema")
}

static GET: Lazy<JSONSchema> = Lazy::new(|| {
    compile(
        r#"{
            "type": "object",
            "required": ["requestId", "path"],
            "properties": {
                "requestId": {},
                "path": { "type": "string" },
                "attribute": { "type": "string" }
            }
        }"#,
    )
});

static SET: Lazy<JSONSchema> = Lazy::new(|| {
    compile(
        r#"{
            "type": "object",
            "required": ["requestId", "path", "value"],
            "properties": {
                "requestId": {},
                "path": { "type": "string" },
                "value": {},
                "attribute": { "type": "string" }
            }
        }"#,
    )
});

static GET_METADATA: Lazy<JSONSchema> = Lazy::new(|| {
    compile(
        r#"{
            "type": "object",
            "required": ["requestId", "path"],
            "properties": {
                "requestId": {},
                "path": { "type": "string" }
            }
        }"#,
    )
});

static SUBSCRIBE: Lazy<JSONSchema> = Lazy::new(|| {
    compile(
        r#"{
            "type": "object",
            "required": ["requestId", "path"],
            "properties": {
                "requestId": {},
                "path": { "type": "string" },
                "attribute": { "type": "string" }
            }
        }"#,
    )
});

static UNSUBSCRIBE: Lazy<JSONSchema> = Lazy::new(|| {
    compile(
        r#"{
            "type": "object",
            "required": ["requestId", "subscriptionId"],
            "properties": {
                "requestId": {},
                "subscriptionId": { "type": "string" }
            }
        }"#,
    )
});

static UPDATE_METADATA: Lazy<JSONSchema> = Lazy::new(|| {
    compile(
        r#"{
            "type": "object",
            "required": ["requestId", "path", "metadata"],
            "properties": {
                "requestId": {},
                "path": { "type": "string" },
                "metadata": { "type": "object" }
            }
        }"#,
    )
});

static UPDATE_VSS_TREE: Lazy<JSONSchema> = Lazy::new(|| {
    compile(
        r#"{
            "type": "object",
            "required": ["requestId", "path", "data"],
            "properties": {
                "requestId": {},
                "path": { "type": "string" },
                "data": { "type": "object" }
            }
        }"#,
    )
});

/// The seven command kinds the processor dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Get,
    Set,
    GetMetadata,
    Subscribe,
    Unsubscribe,
    UpdateMetaData,
    UpdateVssTree,
}

impl CommandKind {
    /// Parse the wire `action` discriminant.
    pub fn parse(action: &str) -> Option<Self> {
        Some(match action {
            "get" => Self::Get,
            "set" => Self::Set,
            "getMetadata" => Self::GetMetadata,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "updateMetaData" => Self::UpdateMetaData,
            "updateVSSTree" => Self::UpdateVssTree,
            _ => return None,
        })
    }

    fn schema(self) -> &'static JSONSchema {
        match self {
            Self::Get => &GET,
            Self::Set => &SET,
            Self::GetMetadata => &GET_METADATA,
            Self::Subscribe => &SUBSCRIBE,
            Self::Unsubscribe => &UNSUBSCRIBE,
            Self::UpdateMetaData => &UPDATE_METADATA,
            Self::UpdateVssTree => &UPDATE_VSS_TREE,
        }
    }
}

/// Validate `request` against the schema for `kind`, collecting every
/// violation into a single [`VssError::SchemaError`].
pub fn validate(kind: CommandKind, request: &Json) -> Result<(), VssError> {
    let schema = kind.schema();
    match schema.validate(request) {
        Ok(()) => Ok(()),
        Err(errors) => {
            let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
            Err(VssError::SchemaError(messages.join("; ")))
        }
    }
}

/// Best-effort extraction of `requestId` from a request body, used so a
/// malformed request can still echo back its id in the error envelope.
/// Mirrors `tryExtractRequestId`'s "don't fail twice" behavior: if the field
/// is missing or not a scalar, the literal string `"UNKNOWN"` is returned
/// rather than erroring.
pub fn try_extract_request_id(request: &Json) -> Json {
    match request.get("requestId") {
        Some(id) if id.is_string() || id.is_number() => id.clone(),
        _ => Json::String("UNKNOWN".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_requires_path() {
        let request = json!({ "requestId": "1" });
        assert!(validate(CommandKind::Get, &request).is_err());
    }

    #[test]
    fn get_with_path_is_valid() {
        let request = json!({ "requestId": "1", "path": "Vehicle.Speed" });
        assert!(validate(CommandKind::Get, &request).is_ok());
    }

    #[test]
    fn set_requires_value() {
        let request = json!({ "requestId": "1", "path": "Vehicle.Speed" });
        assert!(validate(CommandKind::Set, &request).is_err());
    }

    #[test]
    fn extracts_request_id_when_present() {
        let request = json!({ "requestId": "abc" });
        assert_eq!(try_extract_request_id(&request), json!("abc"));
    }

    #[test]
    fn missing_request_id_falls_back_to_unknown() {
        let request = json!({});
        assert_eq!(try_extract_request_id(&request), json!("UNKNOWN"));
    }

    #[test]
    fn command_kind_parses_known_actions() {
        assert_eq!(CommandKind::parse("get"), Some(CommandKind::Get));
        assert_eq!(CommandKind::parse("bogus"), None);
    }
}
