//! In-memory resource client
//!
//! Behaves like the real backends as far as the dispatcher can tell (ids are
//! assigned on create, updates merge, deleting a missing resource fails, scans
//! are paginated) and records every backend call it receives.

use super::identity::{CreateFields, UpdateFields};
use super::{ParameterBag, ResourceClient, ResourceKind, Snapshot, SnapshotStream};
use crate::error::BackendError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Default number of snapshots per scan page
const DEFAULT_PAGE_SIZE: usize = 2;

/// A backend call observed by [`InMemoryClient`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create,
    Read(String),
    ScanPage { offset: usize },
    Update(String),
    Delete(String),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

type Store = Arc<Mutex<BTreeMap<String, Map<String, Value>>>>;

/// Fake backend for one resource kind
pub struct InMemoryClient {
    kind: ResourceKind,
    store: Store,
    calls: CallLog,
    page_size: usize,
    fail_scan_at: Option<usize>,
}

impl InMemoryClient {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            store: Arc::default(),
            calls: Arc::default(),
            page_size: DEFAULT_PAGE_SIZE,
            fail_scan_at: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make the scan fail when it requests the page starting at `offset`
    pub fn failing_scan_at(mut self, offset: usize) -> Self {
        self.fail_scan_at = Some(offset);
        self
    }

    /// Shared handle on the recorded calls
    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    /// Number of stored resources
    pub fn len(&self) -> usize {
        self.lock_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Map<String, Value>>> {
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn not_found(&self, id: &str) -> BackendError {
        BackendError::not_found(format!("{} '{}' not found", self.kind, id))
    }

    /// Fields a create/update stores, shaped like the real backend's snapshot
    fn fields_for_create(&self, params: &ParameterBag) -> Map<String, Value> {
        match self.kind {
            ResourceKind::Identity => CreateFields::from_params(params).snapshot_fields(),
            ResourceKind::Document => params
                .fields_except(&["docId"])
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        }
    }

    fn fields_for_update(&self, params: &ParameterBag) -> Map<String, Value> {
        match self.kind {
            ResourceKind::Identity => UpdateFields::from_params(params).snapshot_fields(),
            ResourceKind::Document => params
                .fields_except(&["docId"])
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        }
    }
}

#[async_trait]
impl ResourceClient for InMemoryClient {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn create(&self, params: &ParameterBag) -> Result<Snapshot, BackendError> {
        self.record(Call::Create);

        let id = match (self.kind, params.get("docId")) {
            (ResourceKind::Document, Some(id)) => id.to_string(),
            _ => uuid::Uuid::new_v4().simple().to_string(),
        };
        let fields = self.fields_for_create(params);

        let mut store = self.lock_store();
        if store.contains_key(&id) {
            return Err(BackendError::Rejected {
                status: 409,
                code: "ALREADY_EXISTS".to_string(),
                message: format!("{} '{}' already exists", self.kind, id),
            });
        }
        store.insert(id.clone(), fields.clone());
        Ok(Snapshot::new(id, fields))
    }

    async fn read(&self, id: &str) -> Result<Snapshot, BackendError> {
        self.record(Call::Read(id.to_string()));

        self.lock_store()
            .get(id)
            .map(|fields| Snapshot::new(id, fields.clone()))
            .ok_or_else(|| self.not_found(id))
    }

    fn scan(&self) -> SnapshotStream<'_> {
        let pages = futures::stream::try_unfold(Some(0usize), move |offset| async move {
            let Some(offset) = offset else {
                return Ok(None);
            };
            self.record(Call::ScanPage { offset });
            if self.fail_scan_at == Some(offset) {
                return Err(BackendError::unavailable("connection reset during scan"));
            }

            let store = self.lock_store();
            let page: Vec<Result<Snapshot, BackendError>> = store
                .iter()
                .skip(offset)
                .take(self.page_size)
                .map(|(id, fields)| Ok(Snapshot::new(id.clone(), fields.clone())))
                .collect();
            let next = offset + page.len();
            let next = (next < store.len()).then_some(next);
            Ok(Some((futures::stream::iter(page), next)))
        });

        Box::pin(futures::TryStreamExt::try_flatten(pages))
    }

    async fn update(&self, id: &str, params: &ParameterBag) -> Result<Snapshot, BackendError> {
        self.record(Call::Update(id.to_string()));

        let changes = self.fields_for_update(params);
        let mut store = self.lock_store();
        let fields = match self.kind {
            // Firestore merge-updates create the document when it is missing
            ResourceKind::Document => store.entry(id.to_string()).or_default(),
            ResourceKind::Identity => store.get_mut(id).ok_or_else(|| self.not_found(id))?,
        };
        fields.extend(changes);
        Ok(Snapshot::new(id, fields.clone()))
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.record(Call::Delete(id.to_string()));

        self.lock_store()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| self.not_found(id))
    }
}
