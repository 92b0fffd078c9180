//! connector::envelope
//!
//! Normalization of the server's JSON envelope into typed results.
//!
//! # Envelope
//!
//! Every response body has the shape `{"response": {...}}`. Only the inner
//! object is passed downward as a [`Payload`]; the outer wrapper is never
//! exposed. A body without a `response` object unwraps to an empty payload
//! instead of failing, so commands can decide for themselves whether a
//! missing field matters.
//!
//! # Typed results
//!
//! Results are a raw mapping plus typed accessors: each report keeps the
//! full payload (reachable through `Deref`) so server-specific fields stay
//! available, while the common fields get checked accessors.
//!
//! # Example
//!
//! ```
//! use geoconnect::connector::envelope::{parse_commits, unwrap_envelope};
//! use serde_json::json;
//!
//! let payload = unwrap_envelope(json!({
//!     "response": {
//!         "success": true,
//!         "commit": [{
//!             "id": "a1", "tree": "t1", "parents": ["p1"], "message": "init",
//!             "author": {"name": "ana", "timestamp": 1400000000000i64}
//!         }]
//!     }
//! }));
//! let commits = parse_commits(&payload).unwrap();
//! assert_eq!(commits[0].id(), Some("a1"));
//! assert_eq!(commits[0].author().name(), Some("ana"));
//! assert!(commits[0].committer().name().is_none());
//! ```

use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::Cause;
use crate::core::types::TransactionId;

/// Top-level envelope key carrying the payload.
pub const RESPONSE_KEY: &str = "response";

/// Extract the payload from a decoded response body.
///
/// Returns an empty payload when `response` is absent or not an object.
pub fn unwrap_envelope(envelope: Value) -> Payload {
    match envelope {
        Value::Object(mut outer) => match outer.remove(RESPONSE_KEY) {
            Some(Value::Object(inner)) => Payload(inner),
            _ => Payload::default(),
        },
        _ => Payload::default(),
    }
}

/// The unwrapped JSON object of a response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Wrap an existing JSON object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Whether the server reported `success: true`.
    ///
    /// A missing field counts as `false`.
    pub fn success(&self) -> bool {
        match self.0.get("success") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    /// Whether the server explicitly reported `success: false`.
    pub fn is_rejected(&self) -> bool {
        match self.0.get("success") {
            Some(Value::Bool(b)) => !*b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("false"),
            _ => false,
        }
    }

    /// The server's error text, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.get_str("error")
    }

    /// Look up a string field.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Look up an object field.
    pub fn get_object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.0.get(key).and_then(Value::as_object)
    }

    /// Borrow the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the underlying JSON object.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Consume into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Fail with [`Cause::Rejected`] if the server reported `success: false`.
    pub(crate) fn ensure_success(&self) -> Result<(), Cause> {
        if self.is_rejected() {
            Err(Cause::Rejected(
                self.error_message()
                    .unwrap_or("server reported failure")
                    .to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Deref for Payload {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        payload.into_value()
    }
}

/// Name and time of a commit's author or committer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    /// Milliseconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
}

impl Signature {
    /// The person's name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Raw timestamp in epoch milliseconds.
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Timestamp as a UTC date-time.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(DateTime::from_timestamp_millis)
    }
}

/// One commit from a log response.
///
/// Built only by [`parse_commits`]. Serializing it reproduces the field
/// names of the server representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<String>,
    parents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    author: Signature,
    committer: Signature,
}

impl CommitRecord {
    /// Commit identifier.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Root tree identifier.
    pub fn tree(&self) -> Option<&str> {
        self.tree.as_deref()
    }

    /// Parent identifiers, in server order.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Commit message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Author signature.
    pub fn author(&self) -> &Signature {
        &self.author
    }

    /// Committer signature.
    pub fn committer(&self) -> &Signature {
        &self.committer
    }

    /// Check if this is a merge commit.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// Parse every entry of the payload's `commit` field.
///
/// A missing or empty list yields an empty vec. A single object is read as
/// a one-element list, since the server collapses one-element arrays.
pub fn parse_commits(payload: &Payload) -> Result<Vec<CommitRecord>, Cause> {
    match payload.get("commit") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(entries)) => entries.iter().map(parse_commit).collect(),
        Some(entry @ Value::Object(_)) => Ok(vec![parse_commit(entry)?]),
        Some(other) => Err(Cause::Parse(format!(
            "`commit` must be a list, got {}",
            type_name(other)
        ))),
    }
}

/// Parse one commit entry.
pub fn parse_commit(entry: &Value) -> Result<CommitRecord, Cause> {
    let obj = entry.as_object().ok_or_else(|| {
        Cause::Parse(format!(
            "commit entry must be an object, got {}",
            type_name(entry)
        ))
    })?;

    Ok(CommitRecord {
        id: opt_string(obj, "id")?,
        tree: opt_string(obj, "tree")?,
        parents: parse_parents(obj.get("parents"))?,
        message: opt_string(obj, "message")?,
        author: parse_signature(obj.get("author"))?,
        committer: parse_signature(obj.get("committer"))?,
    })
}

fn parse_parents(value: Option<&Value>) -> Result<Vec<String>, Cause> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(id)) => Ok(vec![id.clone()]),
        Some(Value::Array(ids)) => ids
            .iter()
            .map(|id| {
                id.as_str().map(str::to_string).ok_or_else(|| {
                    Cause::Parse(format!("parent id must be a string, got {}", type_name(id)))
                })
            })
            .collect(),
        // {"id": [...]} as produced by the XML-to-JSON bridge
        Some(Value::Object(obj)) => parse_parents(obj.get("id")),
        Some(other) => Err(Cause::Parse(format!(
            "`parents` must be a list, got {}",
            type_name(other)
        ))),
    }
}

/// Epoch milliseconds from a JSON number; whole-valued floats are accepted.
fn number_millis(n: &serde_json::Number) -> Result<i64, Cause> {
    if let Some(millis) = n.as_i64() {
        return Ok(millis);
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(f as i64)
        }
        _ => Err(Cause::Parse(format!(
            "timestamp {} is not a whole number of milliseconds",
            n
        ))),
    }
}

fn parse_signature(value: Option<&Value>) -> Result<Signature, Cause> {
    let obj = match value {
        Some(Value::Object(obj)) => obj,
        _ => return Ok(Signature::default()),
    };

    let timestamp = match obj.get("timestamp") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(number_millis(n)?),
        Some(Value::String(s)) => Some(s.trim().parse::<i64>().map_err(|_| {
            Cause::Parse(format!("timestamp '{}' is not a number", s))
        })?),
        Some(other) => {
            return Err(Cause::Parse(format!(
                "timestamp must be a number, got {}",
                type_name(other)
            )))
        }
    };

    Ok(Signature {
        name: opt_string(obj, "name")?,
        timestamp,
    })
}

/// A resolved reference, kept as the server's `Ref` mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference(Map<String, Value>);

impl Reference {
    /// Full reference name (e.g. `refs/heads/master`).
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Identifier of the object the reference points to.
    pub fn object_id(&self) -> Option<&str> {
        self.0.get("objectId").and_then(Value::as_str)
    }

    /// Borrow the raw mapping.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the raw mapping.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl Deref for Reference {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Read the payload's `Ref` field unchanged.
pub fn parse_reference(payload: Payload) -> Result<Reference, Cause> {
    match payload.into_inner().remove("Ref") {
        Some(Value::Object(map)) => Ok(Reference(map)),
        None | Some(Value::Null) => Err(Cause::NotFound("response carries no `Ref`".into())),
        Some(other) => Err(Cause::Parse(format!(
            "`Ref` must be an object, got {}",
            type_name(&other)
        ))),
    }
}

macro_rules! payload_report {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name(Payload);

        impl $name {
            /// Whether the server reported success.
            pub fn success(&self) -> bool {
                self.0.success()
            }

            /// Borrow the full payload.
            pub fn payload(&self) -> &Payload {
                &self.0
            }

            /// Consume into the full payload.
            pub fn into_payload(self) -> Payload {
                self.0
            }
        }

        impl From<Payload> for $name {
            fn from(payload: Payload) -> Self {
                Self(payload)
            }
        }

        impl Deref for $name {
            type Target = Payload;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

payload_report!(
    /// Result of the `status` command.
    StatusReport
);

impl StatusReport {
    /// Current branch, from `header.branch`.
    pub fn branch(&self) -> Option<&str> {
        self.0
            .get_object("header")
            .and_then(|h| h.get("branch"))
            .and_then(Value::as_str)
    }
}

payload_report!(
    /// Result of the `version` command.
    VersionInfo
);

impl VersionInfo {
    /// Released project version.
    pub fn project_version(&self) -> Option<&str> {
        self.0.get_str("ProjectVersion")
    }

    /// Build timestamp as reported by the server.
    pub fn build_time(&self) -> Option<&str> {
        self.0.get_str("BuildTime")
    }

    /// Commit the server was built from.
    pub fn git_commit_id(&self) -> Option<&str> {
        self.0.get_str("GitCommitID")
    }

    /// Branch the server was built from.
    pub fn git_branch(&self) -> Option<&str> {
        self.0.get_str("GitBranch")
    }
}

payload_report!(
    /// Result of `beginTransaction`.
    TransactionReceipt
);

impl TransactionReceipt {
    /// The issued transaction id, from `Transaction.ID`.
    pub fn transaction_id(&self) -> Option<TransactionId> {
        self.0
            .get_object("Transaction")
            .and_then(|t| t.get("ID"))
            .and_then(Value::as_str)
            .and_then(|id| TransactionId::new(id).ok())
    }
}

/// Direction of a push/pull exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Local changes sent to the remote
    Push,
    /// Remote changes fetched and merged
    Pull,
}

impl SyncKind {
    /// Remote command name.
    pub fn command(self) -> &'static str {
        match self {
            SyncKind::Push => "push",
            SyncKind::Pull => "pull",
        }
    }

    /// Payload field echoing the outcome.
    pub fn echo_key(self) -> &'static str {
        match self {
            SyncKind::Push => "Push",
            SyncKind::Pull => "Pull",
        }
    }
}

/// Result of `push` or `pull`.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    kind: SyncKind,
    payload: Payload,
}

impl SyncReport {
    pub(crate) fn new(kind: SyncKind, payload: Payload) -> Self {
        Self { kind, payload }
    }

    /// Whether this was a push or a pull.
    pub fn kind(&self) -> SyncKind {
        self.kind
    }

    /// Whether the server reported success.
    pub fn success(&self) -> bool {
        self.payload.success()
    }

    /// The command-specific echo field (`Push` or `Pull`).
    pub fn echo(&self) -> Option<&Value> {
        self.payload.get(self.kind.echo_key())
    }

    /// Borrow the full payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// One entry of a tree listing.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    path: String,
    fields: Map<String, Value>,
}

impl TreeNode {
    /// Path of the node within the tree.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All fields the server sent for this node, `path` included.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Result of `ls-tree`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeListing {
    nodes: Vec<TreeNode>,
    payload: Payload,
}

impl TreeListing {
    /// Parse the payload's `node` list; every node needs a `path`.
    pub fn from_payload(payload: Payload) -> Result<Self, Cause> {
        let entries: Vec<&Value> = match payload.get("node") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(nodes)) => nodes.iter().collect(),
            Some(node @ Value::Object(_)) => vec![node],
            Some(other) => {
                return Err(Cause::Parse(format!(
                    "`node` must be a list, got {}",
                    type_name(other)
                )))
            }
        };

        let nodes = entries
            .into_iter()
            .map(|entry| {
                let fields = entry
                    .as_object()
                    .ok_or_else(|| Cause::Parse("tree node must be an object".into()))?;
                let path = fields
                    .get("path")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Cause::Parse("tree node has no `path`".into()))?;
                Ok(TreeNode {
                    path: path.to_string(),
                    fields: fields.clone(),
                })
            })
            .collect::<Result<Vec<_>, Cause>>()?;

        Ok(Self { nodes, payload })
    }

    /// Listed nodes, in server order.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Paths of all listed nodes.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(TreeNode::path)
    }

    /// Whether the server reported success.
    pub fn success(&self) -> bool {
        self.payload.success()
    }

    /// Borrow the full payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

fn opt_string(obj: &Map<String, Value>, key: &str) -> Result<Option<String>, Cause> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(Cause::Parse(format!(
            "`{}` must be a string, got {}",
            key,
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
