//! Action Dispatch
//!
//! Routes a validated [`OperationRequest`] to the matching operation of the
//! client registered for its resource kind.

use super::validator::validate;
use super::{
    Action, OperationOutcome, OperationRequest, OperationResult, ResourceClient, ResourceKind,
};
use crate::error::{BackendError, CrudError};
use futures::TryStreamExt;
use std::collections::BTreeMap;

/// Routing table: one client per resource kind
#[derive(Default)]
pub struct Dispatcher {
    clients: BTreeMap<ResourceKind, Box<dyn ResourceClient>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under its own kind, replacing any previous one
    pub fn with_client(mut self, client: Box<dyn ResourceClient>) -> Self {
        self.register(client);
        self
    }

    pub fn register(&mut self, client: Box<dyn ResourceClient>) {
        self.clients.insert(client.kind(), client);
    }

    /// Validate `request` and run it against its client
    ///
    /// Validation failures return without touching any client. Backend
    /// failures come back wrapped with the kind and action that failed.
    pub async fn dispatch(&self, request: &OperationRequest) -> OperationResult {
        let kind = request.kind();
        let action = request.action();
        let params = request.params();

        let client = self
            .clients
            .get(&kind)
            .ok_or_else(|| CrudError::UnknownResourceKind {
                kind: kind.to_string(),
                action: action.to_string(),
            })?;

        validate(kind, action, params)?;

        tracing::info!("dispatch: kind={}, action={}", kind, action);

        let wrap = |source: BackendError| CrudError::Backend {
            kind,
            action,
            source,
        };

        let outcome = match (action, params.id(kind)) {
            (Action::Create, _) => {
                OperationOutcome::Snapshot(client.create(params).await.map_err(wrap)?)
            }
            (Action::Read, Some(id)) => {
                OperationOutcome::Snapshot(client.read(id).await.map_err(wrap)?)
            }
            (Action::Read, None) => {
                let snapshots: Vec<_> = client.scan().try_collect().await.map_err(wrap)?;
                tracing::info!("scan: {} {} resources", snapshots.len(), kind);
                OperationOutcome::Snapshots(snapshots)
            }
            (Action::Update, Some(id)) => {
                OperationOutcome::Snapshot(client.update(id, params).await.map_err(wrap)?)
            }
            (Action::Delete, Some(id)) => {
                client.delete(id).await.map_err(wrap)?;
                OperationOutcome::Deleted { id: id.to_string() }
            }
            // Unreachable after validation, reported the same way regardless
            (Action::Update | Action::Delete, None) => {
                return Err(CrudError::MissingParameter {
                    kind,
                    action,
                    name: kind.id_param().to_string(),
                })
            }
        };

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::memory::{Call, InMemoryClient};
    use crate::resource::ParameterBag;

    fn request(kind: ResourceKind, action: Action, params: ParameterBag) -> OperationRequest {
        OperationRequest::new(kind, action, params)
    }

    #[tokio::test]
    async fn test_missing_identifier_makes_no_backend_calls() {
        for kind in ResourceKind::ALL {
            let client = InMemoryClient::new(kind);
            let calls = client.call_log();
            let dispatcher = Dispatcher::new().with_client(Box::new(client));

            for action in [Action::Update, Action::Delete] {
                let err = dispatcher
                    .dispatch(&request(kind, action, ParameterBag::new()))
                    .await
                    .unwrap_err();
                assert!(matches!(err, CrudError::MissingParameter { .. }));
            }
            assert!(calls.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_unregistered_kind_is_unknown() {
        let dispatcher =
            Dispatcher::new().with_client(Box::new(InMemoryClient::new(ResourceKind::Identity)));
        let err = dispatcher
            .dispatch(&request(ResourceKind::Document, Action::Read, ParameterBag::new()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CrudError::UnknownResourceKind {
                kind: "document".to_string(),
                action: "read".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_read_routes_by_identifier_presence() {
        let client = InMemoryClient::new(ResourceKind::Document);
        let calls = client.call_log();
        let dispatcher = Dispatcher::new().with_client(Box::new(client));

        let created = dispatcher
            .dispatch(&request(
                ResourceKind::Document,
                Action::Create,
                ParameterBag::new().with("first", "Ada"),
            ))
            .await
            .unwrap();
        let OperationOutcome::Snapshot(created) = created else {
            panic!("expected snapshot");
        };

        dispatcher
            .dispatch(&request(
                ResourceKind::Document,
                Action::Read,
                ParameterBag::new().with("docId", &created.id),
            ))
            .await
            .unwrap();
        dispatcher
            .dispatch(&request(ResourceKind::Document, Action::Read, ParameterBag::new()))
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        assert!(matches!(calls[0], Call::Create));
        assert!(matches!(calls[1], Call::Read(ref id) if *id == created.id));
        assert!(matches!(calls[2], Call::ScanPage { .. }));
    }

    #[tokio::test]
    async fn test_backend_failure_is_wrapped_with_kind_and_action() {
        let dispatcher =
            Dispatcher::new().with_client(Box::new(InMemoryClient::new(ResourceKind::Identity)));
        let err = dispatcher
            .dispatch(&request(
                ResourceKind::Identity,
                Action::Delete,
                ParameterBag::new().with("userId", "ghost"),
            ))
            .await
            .unwrap_err();

        match err {
            CrudError::Backend { kind, action, source } => {
                assert_eq!(kind, ResourceKind::Identity);
                assert_eq!(action, Action::Delete);
                assert!(source.is_not_found());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
