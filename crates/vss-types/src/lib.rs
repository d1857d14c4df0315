//! Shared primitive types for the VSS signal server: path algebra, the tree
//! document model, connection/subscription state, and the error taxonomy
//! every other crate converges its own errors into.

mod path;
mod tree;

pub use path::{Origin, Path};
pub use tree::{Attribute, Branch, Datatype, Leaf, LeafMeta, LeafType, Node, RuntimeValue, Scalar};

use std::collections::HashMap;
use uuid::Uuid;

/// A single path-glob → rights grant decoded from a capability token, e.g.
/// `"Vehicle.Cabin.*": "rw"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    pub pattern: String,
    pub can_read: bool,
    pub can_write: bool,
}

/// Which wire transport owns this channel, and therefore how leaf values on
/// it should be serialized. The transports themselves aren't implemented
/// here; this only records which shape a future transport layer would need
/// from [`vss_store_core::TreeBackend::get_signal`]'s `as_string` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Numeric leaf values round-trip as decimal strings for bit-exact JSON.
    Ws,
    /// Numeric leaf values round-trip as native typed JSON numbers.
    #[default]
    Grpc,
}

/// Connection-scoped state: what the currently attached client is allowed to
/// do. Modeled after `KuksaChannel` (`wschannel.hpp`), which bundles a
/// connection id with its authorization state and permission map.
#[derive(Debug, Clone)]
pub struct Channel {
    pub connection_id: Uuid,
    pub authorized: bool,
    pub permissions: Vec<PermissionGrant>,
    /// Unix millis the current token expires at, if any.
    pub token_expiry_ms: Option<i64>,
    /// Gates `apply_overlay`/`updateVSSTree`: only the internal-privilege
    /// channel the startup loader constructs for itself may restructure the
    /// tree, mirroring the mock modify-tree channel `applyOverlays` builds
    /// in the original startup sequence.
    pub modify_tree: bool,
    /// Which transport owns this channel, and therefore whether `get`
    /// responses carry numeric leaf values as JSON numbers or decimal
    /// strings.
    pub transport_kind: TransportKind,
}

impl Channel {
    /// An unauthenticated, unauthorized channel — the default state before a
    /// capability token is presented.
    pub fn anonymous() -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            authorized: false,
            permissions: Vec::new(),
            token_expiry_ms: None,
            modify_tree: false,
            transport_kind: TransportKind::default(),
        }
    }

    /// A channel with blanket rights, used only for startup tree/overlay
    /// ingestion — never reachable from a transport.
    pub fn internal_privilege() -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            authorized: true,
            permissions: vec![PermissionGrant {
                pattern: "*".to_owned(),
                can_read: true,
                can_write: true,
            }],
            token_expiry_ms: None,
            modify_tree: true,
            transport_kind: TransportKind::default(),
        }
    }
}

/// One client's watch on a single leaf path + attribute. Created by
/// `subscribe`, torn down by `unsubscribe` or channel close.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub leaf_path: String,
    pub attribute: Attribute,
}

/// The unified error taxonomy (spec §7), collapsed from a richer exception
/// hierarchy (not-found, no-permission, out-of-bounds, not-set, generic
/// catch-all) into one enum every crate's local error converts into.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VssError {
    #[error("schema error: {0}")]
    SchemaError(String),

    #[error("no path found: {0}")]
    NoPathFound(String),

    #[error("no permission for path: {0}")]
    NoPermission(String),

    #[error("value out of bounds for path {path}: {reason}")]
    OutOfBounds { path: String, reason: String },

    /// Not an error condition over the wire (200, `data: null`), but
    /// distinct from a successful value so callers can tell "set but
    /// absent" apart from "present".
    #[error("no value set for path: {0}")]
    NotSet(String),

    #[error("{0}")]
    Generic(String),
}

impl VssError {
    /// The string HTTP-equivalent status code the wire envelope carries.
    /// Kept as `&str` rather than a number: the response envelope
    /// serializes `error.number` as a JSON string, not an integer.
    pub fn number(&self) -> &'static str {
        match self {
            Self::SchemaError(_) => "400",
            Self::NoPathFound(_) => "404",
            Self::NoPermission(_) => "403",
            Self::OutOfBounds { .. } => "400",
            Self::NotSet(_) => "200",
            Self::Generic(_) => "401",
        }
    }

    /// Short reason phrase for the response envelope.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::SchemaError(_) => "Bad Request",
            Self::NoPathFound(_) => "Path not found",
            Self::NoPermission(_) => "Forbidden",
            Self::OutOfBounds { .. } => "Value passed is out of bounds",
            Self::NotSet(_) => "Value not set",
            Self::Generic(_) => "Unknown error",
        }
    }
}

/// A decoded capability token's claim set: subject plus the permission grants
/// it carries. Lives here (not in `vss-auth`) so `vss-access` and
/// `vss-kernel` can depend on the shape without depending on the JWT library.
#[derive(Debug, Clone)]
pub struct Claims {
    pub subject: String,
    pub permissions: Vec<PermissionGrant>,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Leaf path → runtime snapshot, used by bulk read/metadata responses.
pub type LeafSnapshot = HashMap<String, RuntimeValue>;
