//! Resource abstraction layer
//!
//! One CLI invocation becomes one [`OperationRequest`]: a [`ResourceKind`],
//! an [`Action`] and a [`ParameterBag`]. The [`Dispatcher`] validates it and
//! routes it to the [`ResourceClient`] registered for the kind.
//!
//! # Architecture
//!
//! - [`validator`] - Checks required parameters before any backend call
//! - [`dispatch`] - Routes (kind, action) to a client operation
//! - [`identity`] - Firebase Authentication users (Identity Toolkit REST)
//! - [`document`] - Cloud Firestore documents (Firestore REST)
//! - [`firestore_value`] - Firestore typed value encoding
//! - [`pager`] - Lazy page-token pagination shared by the scans
//! - [`memory`] - In-memory client that records calls, for tests

pub mod dispatch;
pub mod document;
pub mod firestore_value;
pub mod identity;
pub mod memory;
pub mod pager;
pub mod validator;

use crate::error::{BackendError, CrudError, CrudResult, UnknownName};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use dispatch::Dispatcher;
pub use validator::validate;

/// Which backend a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Identity,
    Document,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Identity, ResourceKind::Document];

    /// Name of the identifier parameter for this kind
    pub fn id_param(self) -> &'static str {
        match self {
            ResourceKind::Identity => "userId",
            ResourceKind::Document => "docId",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Identity => "identity",
            ResourceKind::Document => "document",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identity" | "user" | "users" | "auth" => Ok(ResourceKind::Identity),
            "document" | "doc" | "docs" | "firestore" => Ok(ResourceKind::Document),
            _ => Err(UnknownName(s.to_string())),
        }
    }
}

/// CRUD operation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "read" | "get" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            _ => Err(UnknownName(s.to_string())),
        }
    }
}

/// Named string inputs for one operation
///
/// Empty values are treated as absent, so `--userId ""` behaves like a
/// missing flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterBag {
    values: BTreeMap<String, String>,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    /// Value for `name`, `None` when missing or empty
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Identifier for `kind`, if supplied
    pub fn id(&self, kind: ResourceKind) -> Option<&str> {
        self.get(kind.id_param())
    }

    /// Boolean flag; `None` when absent or not a recognizable boolean
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(parse_bool)
    }

    /// Non-empty entries, skipping the named keys
    pub fn fields_except<'a>(
        &'a self,
        skip: &'a [&'a str],
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.iter().filter(move |(k, _)| !skip.contains(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterBag {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Lenient boolean parsing for flag values
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// One invocation: immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    kind: ResourceKind,
    action: Action,
    params: ParameterBag,
}

impl OperationRequest {
    pub fn new(kind: ResourceKind, action: Action, params: ParameterBag) -> Self {
        Self {
            kind,
            action,
            params,
        }
    }

    /// Build from the raw selector strings given on the command line
    pub fn parse(kind: &str, action: &str, params: ParameterBag) -> CrudResult<Self> {
        let kind = kind
            .parse::<ResourceKind>()
            .map_err(|UnknownName(kind)| CrudError::UnknownResourceKind {
                kind,
                action: action.to_string(),
            })?;
        let action = action
            .parse::<Action>()
            .map_err(|UnknownName(action)| CrudError::UnknownAction { kind, action })?;
        Ok(Self::new(kind, action, params))
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn params(&self) -> &ParameterBag {
        &self.params
    }
}

/// State of one resource as returned by its backend
///
/// Serialized as `{"id": ..., "fields": {...}}` so a stored field that is
/// itself called `id` can never shadow the resource identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Snapshot {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Successful result of one dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Snapshot(Snapshot),
    Snapshots(Vec<Snapshot>),
    Deleted { id: String },
}

impl OperationOutcome {
    pub fn to_json(&self) -> Value {
        match self {
            OperationOutcome::Snapshot(snapshot) => json!(snapshot),
            OperationOutcome::Snapshots(snapshots) => json!(snapshots),
            OperationOutcome::Deleted { id } => json!({ "id": id, "deleted": true }),
        }
    }
}

pub type OperationResult = CrudResult<OperationOutcome>;

/// Lazy, finite sequence of snapshots fetched page by page
pub type SnapshotStream<'a> = BoxStream<'a, Result<Snapshot, BackendError>>;

/// CRUD operations against one backend
///
/// Parameters arrive already validated. Every call maps to exactly one backend
/// request (a scan makes one request per page, fetched on demand); nothing is
/// cached or retried.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Create a resource; the backend assigns the identifier unless one is given
    async fn create(&self, params: &ParameterBag) -> Result<Snapshot, BackendError>;

    /// Read one resource by identifier
    async fn read(&self, id: &str) -> Result<Snapshot, BackendError>;

    /// Read every resource of this kind
    fn scan(&self) -> SnapshotStream<'_>;

    /// Merge the supplied fields into an existing resource
    async fn update(&self, id: &str, params: &ParameterBag) -> Result<Snapshot, BackendError>;

    /// Delete a resource; deleting a missing one is a backend failure
    async fn delete(&self, id: &str) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() {
        assert_eq!("create".parse::<Action>().unwrap(), Action::Create);
        assert_eq!("GET".parse::<Action>().unwrap(), Action::Read);
        assert_eq!(" delete ".parse::<Action>().unwrap(), Action::Delete);
        assert_eq!(
            "destroy".parse::<Action>().unwrap_err(),
            UnknownName("destroy".to_string())
        );
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("user".parse::<ResourceKind>().unwrap(), ResourceKind::Identity);
        assert_eq!(
            "firestore".parse::<ResourceKind>().unwrap(),
            ResourceKind::Document
        );
        assert!("bucket".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_request_parse_names_what_was_asked() {
        assert_eq!(
            OperationRequest::parse("user", "destroy", ParameterBag::new()).unwrap_err(),
            CrudError::UnknownAction {
                kind: ResourceKind::Identity,
                action: "destroy".to_string(),
            }
        );
        assert_eq!(
            OperationRequest::parse("bucket", "read", ParameterBag::new()).unwrap_err(),
            CrudError::UnknownResourceKind {
                kind: "bucket".to_string(),
                action: "read".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_values_are_absent() {
        let params = ParameterBag::new().with("userId", "").with("email", "a@example.com");
        assert_eq!(params.id(ResourceKind::Identity), None);
        assert!(!params.contains("userId"));
        assert_eq!(params.iter().count(), 1);
    }

    #[test]
    fn test_fields_except_skips_identifier() {
        let params = ParameterBag::new()
            .with("docId", "abc")
            .with("first", "Ada")
            .with("born", "1815");
        let fields: Vec<_> = params.fields_except(&["docId"]).collect();
        assert_eq!(fields, vec![("born", "1815"), ("first", "Ada")]);
    }

    #[test]
    fn test_flag_parsing() {
        let params = ParameterBag::new()
            .with("disabled", "yes")
            .with("emailVerified", "maybe");
        assert_eq!(params.flag("disabled"), Some(true));
        assert_eq!(params.flag("emailVerified"), None);
        assert_eq!(params.flag("missing"), None);
        assert_eq!(parse_bool("NO"), Some(false));
        assert_eq!(parse_bool("y"), None);
    }

    #[test]
    fn test_snapshot_serialization() {
        let mut fields = Map::new();
        fields.insert("email".into(), json!("a@example.com"));
        let outcome = OperationOutcome::Snapshot(Snapshot::new("u1", fields));
        assert_eq!(
            outcome.to_json(),
            json!({"id": "u1", "fields": {"email": "a@example.com"}})
        );

        let deleted = OperationOutcome::Deleted { id: "u1".into() };
        assert_eq!(deleted.to_json()["deleted"], json!(true));
    }

    #[test]
    fn test_id_field_does_not_shadow_identifier() {
        let mut fields = Map::new();
        fields.insert("id".into(), json!(42));
        fields.insert("first".into(), json!("Ada"));
        let out = OperationOutcome::Snapshot(Snapshot::new("alovelace", fields)).to_json();

        assert_eq!(out["id"], json!("alovelace"));
        assert_eq!(out["fields"]["id"], json!(42));
        assert_eq!(out["fields"]["first"], json!("Ada"));
    }
}
