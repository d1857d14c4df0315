#![forbid(unsafe_code)]

//! **vss-kernel** – the command processor (C8).
//!
//! Dispatches the seven wire commands (`get`/`set`/`getMetadata`/
//! `subscribe`/`unsubscribe`/`updateMetaData`/`updateVSSTree`) through a
//! fixed pipeline: schema validation, path resolution, capability check,
//! per-command handler, response envelope. Grounded on
//! `VssCommandGet.cpp`/`VssCommandSet.cpp`/`VssCommandSubscribe.cpp`/
//! `VssCommandUnsubscribe.cpp` for the handler bodies and
//! `JsonResponses.cpp` for the envelope shape.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use serde_json::{json, Value as Json};
use uuid::Uuid;

use vss_access::{check_attribute, check_paths};
use vss_bus::{Notification, SubscriptionRegistry};
use vss_schema::{try_extract_request_id, validate, CommandKind};
use vss_store_core::TreeBackend;
use vss_types::{Attribute, Channel, Path, VssError};

/// What `CommandProcessor::process` hands back to the transport. Most
/// commands produce a single response envelope; `subscribe` additionally
/// hands back the receiving half of its notification channel so the
/// transport can pump live updates to the client out of band.
pub enum CommandOutcome {
    Response(Json),
    Subscribed {
        response: Json,
        notifications: Receiver<Notification>,
    },
}

impl CommandOutcome {
    /// The response envelope, regardless of variant.
    pub fn response(&self) -> &Json {
        match self {
            Self::Response(r) => r,
            Self::Subscribed { response, .. } => response,
        }
    }
}

/// The command processor: owns the tree backend and the subscription
/// registry, and has no other state. Every `process` call is independent —
/// there is no per-connection session carried inside the processor, only in
/// the [`Channel`] the caller passes in.
pub struct CommandProcessor {
    tree: Arc<dyn TreeBackend>,
    subscriptions: Arc<SubscriptionRegistry>,
}

fn default_attribute(request: &Json) -> Result<Attribute, VssError> {
    match request.get("attribute").and_then(Json::as_str) {
        None => Ok(Attribute::Value),
        Some(s) => Attribute::parse(s).ok_or_else(|| VssError::SchemaError(format!("unknown attribute {s}"))),
    }
}

fn request_path(request: &Json) -> Result<Path, VssError> {
    let raw = request
        .get("path")
        .and_then(Json::as_str)
        .ok_or_else(|| VssError::SchemaError("missing path".into()))?;
    Ok(Path::from_vss(raw))
}

impl CommandProcessor {
    pub fn new(tree: Arc<dyn TreeBackend>, subscriptions: Arc<SubscriptionRegistry>) -> Self {
        Self { tree, subscriptions }
    }

    /// Run `request` through the full pipeline and produce an outcome.
    /// Never panics on malformed input — every failure mode is folded into
    /// an error envelope.
    pub fn process(&self, channel: &Channel, request: &Json) -> CommandOutcome {
        let action = request.get("action").and_then(Json::as_str);
        let request_id = try_extract_request_id(request);

        let Some(action) = action else {
            return CommandOutcome::Response(self.error_envelope(
                "unknown",
                &request_id,
                &VssError::SchemaError("missing action".into()),
            ));
        };

        let Some(kind) = CommandKind::parse(action) else {
            return CommandOutcome::Response(self.error_envelope(
                action,
                &request_id,
                &VssError::SchemaError(format!("unknown action {action}")),
            ));
        };

        if let Err(e) = validate(kind, request) {
            tracing::warn!(action, error = %e, "schema validation failed");
            return CommandOutcome::Response(self.error_envelope(action, &request_id, &e));
        }

        let result = match kind {
            CommandKind::Get => self
                .handle_get(channel, request)
                .map(|data| CommandOutcome::Response(self.ok_envelope(action, &request_id, data))),
            CommandKind::Set => self
                .handle_set(channel, request)
                .map(|data| CommandOutcome::Response(self.ok_envelope(action, &request_id, data))),
            CommandKind::GetMetadata => self
                .handle_get_metadata(channel, request)
                .map(|data| CommandOutcome::Response(self.ok_envelope(action, &request_id, data))),
            CommandKind::Subscribe => self.handle_subscribe(channel, request),
            CommandKind::Unsubscribe => self
                .handle_unsubscribe(channel, request)
                .map(|data| CommandOutcome::Response(self.ok_envelope(action, &request_id, data))),
            CommandKind::UpdateMetaData => self
                .handle_update_metadata(channel, request)
                .map(|data| CommandOutcome::Response(self.ok_envelope(action, &request_id, data))),
            CommandKind::UpdateVssTree => self
                .handle_update_vss_tree(channel, request)
                .map(|data| CommandOutcome::Response(self.ok_envelope(action, &request_id, data))),
        };

        match result {
            Ok(outcome) => outcome,
            // Not set is not an error over the wire: same envelope shape as
            // success, with `data: null`.
            Err(VssError::NotSet(_)) => {
                CommandOutcome::Response(self.ok_envelope(action, &request_id, Json::Null))
            }
            Err(e) => {
                tracing::debug!(action, error = %e, "command failed");
                CommandOutcome::Response(self.error_envelope(action, &request_id, &e))
            }
        }
    }

    fn ok_envelope(&self, action: &str, request_id: &Json, data: Json) -> Json {
        json!({
            "action": action,
            "requestId": request_id,
            "data": data,
            "ts": vss_store::now_ms(),
        })
    }

    fn error_envelope(&self, action: &str, request_id: &Json, err: &VssError) -> Json {
        json!({
            "action": action,
            "requestId": request_id,
            "error": {
                "number": err.number(),
                "reason": err.reason(),
                "message": err.to_string(),
            },
            "ts": vss_store::now_ms(),
        })
    }

    fn handle_get(&self, channel: &Channel, request: &Json) -> Result<Json, VssError> {
        let path = request_path(request)?;
        let attribute = default_attribute(request)?;

        if path.has_wildcard() {
            let leaves = self.tree.get_leaf_paths(&path);
            if leaves.is_empty() {
                return Err(VssError::NoPathFound(path.to_string()));
            }
            check_paths(&channel.permissions, &leaves, false)?;
            let mut entries = Vec::with_capacity(leaves.len());
            for leaf in &leaves {
                if !self.tree.path_is_attributable(leaf, attribute) {
                    continue;
                }
                let as_string = matches!(channel.transport_kind, vss_types::TransportKind::Ws);
                let (value, timestamp) = match self.tree.get_signal(leaf, attribute, as_string) {
                    Ok(v) => (v.data, Json::from(v.timestamp_ms)),
                    Err(VssError::NotSet(_)) => (Json::Null, Json::Null),
                    Err(e) => return Err(e),
                };
                entries.push(json!({
                    "path": leaf.to_string(),
                    "attribute": attribute.as_str(),
                    "value": value,
                    "timestamp": timestamp,
                }));
            }
            return Ok(Json::Array(entries));
        }

        if !self.tree.path_exists(&path) {
            return Err(VssError::NoPathFound(path.to_string()));
        }
        if !self.tree.path_is_attributable(&path, attribute) {
            return Err(VssError::SchemaError(format!(
                "{path}: {} is not a valid attribute for this leaf",
                attribute.as_str()
            )));
        }
        check_attribute(&channel.permissions, &path, attribute, false)?;

        let as_string = matches!(channel.transport_kind, vss_types::TransportKind::Ws);
        let value = self.tree.get_signal(&path, attribute, as_string)?;
        Ok(json!({ "value": value.data, "timestamp": value.timestamp_ms }))
    }

    fn handle_set(&self, channel: &Channel, request: &Json) -> Result<Json, VssError> {
        let path = request_path(request)?;
        let attribute = default_attribute(request)?;
        if path.has_wildcard() {
            return Err(VssError::SchemaError("set does not support wildcard paths".into()));
        }
        if !self.tree.path_exists(&path) {
            return Err(VssError::NoPathFound(path.to_string()));
        }
        if !self.tree.path_is_writable(&path, attribute) {
            return Err(VssError::SchemaError(format!(
                "{path}: {} is not writable on this leaf",
                attribute.as_str()
            )));
        }
        check_attribute(&channel.permissions, &path, attribute, true)?;

        let raw_value = request.get("value").cloned().unwrap_or(Json::Null);
        let meta_json = self.tree.get_metadata(&path)?;
        let (datatype, leaf_meta) = vss_store::parse_datatype_and_meta(&meta_json)?;
        let sanitized = vss_store::sanitize_value(datatype, &leaf_meta, &raw_value, &path.to_string())?;

        // The timestamp is stamped by `set_signal` itself while it holds the
        // tree's write lock, so two racing writers can never have their clock
        // reads land in a different order than their lock acquisitions.
        let value = self.tree.set_signal(&path, attribute, sanitized)?;
        // Notified after the write returns rather than while still holding
        // the tree's internal lock: the TreeBackend trait boundary doesn't
        // expose a lock guard across the crate split, so this is a narrow
        // window where a fast-enough reader could interleave with a
        // notification. Acceptable for this in-process, single-host server.
        self.subscriptions.notify(&path.canonical(), attribute, &value);

        Ok(Json::Null)
    }

    fn handle_get_metadata(&self, channel: &Channel, request: &Json) -> Result<Json, VssError> {
        let path = request_path(request)?;

        if path.has_wildcard() {
            let leaves = self.tree.get_leaf_paths(&path);
            if leaves.is_empty() {
                return Err(VssError::NoPathFound(path.to_string()));
            }
            check_paths(&channel.permissions, &leaves, false)?;
            let mut out = Vec::with_capacity(leaves.len());
            for leaf in &leaves {
                let meta = self.tree.get_metadata(leaf)?;
                out.push(json!({ "path": leaf.to_string(), "metadata": meta }));
            }
            return Ok(Json::Array(out));
        }

        if !self.tree.path_exists(&path) {
            return Err(VssError::NoPathFound(path.to_string()));
        }
        check_attribute(&channel.permissions, &path, Attribute::Value, false)?;
        self.tree.get_metadata(&path)
    }

    fn handle_subscribe(&self, channel: &Channel, request: &Json) -> Result<CommandOutcome, VssError> {
        let path = request_path(request)?;
        let attribute = default_attribute(request)?;
        let action = "subscribe";
        let request_id = try_extract_request_id(request);

        if path.has_wildcard() {
            return Err(VssError::SchemaError("subscribe does not support wildcard paths".into()));
        }
        if !self.tree.path_exists(&path) {
            return Err(VssError::NoPathFound(path.to_string()));
        }
        if !self.tree.path_is_attributable(&path, attribute) {
            return Err(VssError::SchemaError(format!(
                "{path}: {} is not a valid attribute for this leaf",
                attribute.as_str()
            )));
        }
        check_attribute(&channel.permissions, &path, attribute, false)?;

        let (id, rx) = self
            .subscriptions
            .subscribe(channel.connection_id, &path.canonical(), attribute);
        let response = self.ok_envelope(action, &request_id, json!({ "subscriptionId": id.to_string() }));
        Ok(CommandOutcome::Subscribed { response, notifications: rx })
    }

    fn handle_unsubscribe(&self, _channel: &Channel, request: &Json) -> Result<Json, VssError> {
        let raw = request
            .get("subscriptionId")
            .and_then(Json::as_str)
            .ok_or_else(|| VssError::SchemaError("missing subscriptionId".into()))?;
        let id = Uuid::parse_str(raw)
            .map_err(|_| VssError::SchemaError(format!("malformed subscriptionId {raw}")))?;
        self.subscriptions.unsubscribe(id);
        Ok(Json::Null)
    }

    fn handle_update_metadata(&self, channel: &Channel, request: &Json) -> Result<Json, VssError> {
        if !channel.modify_tree {
            return Err(VssError::NoPermission("updateMetaData requires modify_tree privilege".into()));
        }
        let path = request_path(request)?;
        let metadata = request
            .get("metadata")
            .cloned()
            .ok_or_else(|| VssError::SchemaError("missing metadata".into()))?;
        if !self.tree.path_exists(&path) {
            return Err(VssError::NoPathFound(path.to_string()));
        }
        check_attribute(&channel.permissions, &path, Attribute::Value, true)?;
        self.tree.update_metadata(&path, metadata)?;
        Ok(Json::Null)
    }

    fn handle_update_vss_tree(&self, channel: &Channel, request: &Json) -> Result<Json, VssError> {
        // Restructuring the tree is a higher privilege than writing a
        // signal value: only the internal-privilege channel the overlay
        // loader uses at startup may call this, mirroring the mock
        // modify-tree channel `applyOverlays` constructs for itself.
        if !channel.modify_tree {
            return Err(VssError::NoPermission("updateVSSTree requires modify_tree privilege".into()));
        }
        let data = request
            .get("data")
            .cloned()
            .ok_or_else(|| VssError::SchemaError("missing data".into()))?;
        self.tree.apply_overlay(data)?;
        Ok(Json::Null)
    }
}

/// Documents the seam a future REST/HTTP transport would attach through,
/// without the core depending on anything web-shaped. Not implemented: the
/// transport itself is out of scope, this only names the contract a
/// translator would need to satisfy.
pub trait RequestTranslator {
    /// Turn a transport-specific request (a URI and method, a gRPC message,
    /// whatever) into the JSON command envelope [`CommandProcessor::process`]
    /// expects.
    fn to_command(&self) -> Json;

    /// Turn a [`CommandOutcome`] response envelope back into whatever shape
    /// the transport's clients expect.
    fn from_response(&self, response: &Json) -> Json;
}
