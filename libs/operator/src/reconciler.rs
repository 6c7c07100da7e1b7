use crate::annotations::{self, AbsentReason};
use crate::informer::ResourceEventHandler;
use crate::resource::{AnnotatedResource, ResourceKind, WatchedResourceRef};

use dexsync_registry::{RegistrationOutcome, Registry};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

/// Keeps registry clients in sync with the objects of one kind
///
/// Every method returns the outcome of the registry call it made, `None` when the event
/// needed no call.
#[derive(Clone)]
pub struct Reconciler {
    kind: ResourceKind,
    registry: Arc<dyn Registry>,
}

impl Reconciler {
    pub fn new(kind: ResourceKind, registry: Arc<dyn Registry>) -> Self {
        Self { kind, registry }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn project<K: AnnotatedResource>(&self, obj: &K) -> Option<WatchedResourceRef> {
        WatchedResourceRef::project(self.kind, obj)
            .map_err(|e| {
                error!(msg = "failed to read object event", kind = %self.kind, %e);
            })
            .ok()
    }

    pub async fn on_add<K: AnnotatedResource>(&self, obj: &K) -> Option<RegistrationOutcome> {
        let resource = self.project(obj)?;
        debug!(
            msg = "checking object",
            kind = %resource.kind,
            api_version = resource.api_version(),
            namespace = resource.namespace(),
            name = resource.name,
        );

        let intent = match annotations::extract(&resource.annotations) {
            Ok(intent) => intent,
            Err(reason @ AbsentReason::NotOptedIn) => {
                debug!(
                    msg = format!("ignoring object, {reason}"),
                    kind = %resource.kind,
                    namespace = resource.namespace(),
                    name = resource.name,
                );
                return None;
            }
            Err(reason @ AbsentReason::Misconfigured(_)) => {
                warn!(
                    msg = format!("ignoring object, {reason}"),
                    kind = %resource.kind,
                    namespace = resource.namespace(),
                    name = resource.name,
                );
                return None;
            }
        };

        info!(
            msg = "registering client",
            kind = %resource.kind,
            namespace = resource.namespace(),
            name = resource.name,
            client_id = intent.id,
            client_name = intent.name,
            redirect_uris = ?intent.redirect_uris,
        );
        let outcome = self.registry.create(&intent).await;
        log_outcome(&resource, &intent.id, &outcome);
        Some(outcome)
    }

    pub async fn on_delete<K: AnnotatedResource>(&self, obj: &K) -> Option<RegistrationOutcome> {
        let resource = self.project(obj)?;
        let Some(client_id) = annotations::lookup_client_id(&resource.annotations) else {
            debug!(
                msg = "ignoring deleted object without client id",
                kind = %resource.kind,
                namespace = resource.namespace(),
                name = resource.name,
            );
            return None;
        };

        info!(
            msg = "deleting client",
            kind = %resource.kind,
            namespace = resource.namespace(),
            name = resource.name,
            client_id,
        );
        let outcome = self.registry.delete(client_id).await;
        log_outcome(&resource, client_id, &outcome);
        Some(outcome)
    }

    /// Delete of the old client, then add of the new one
    pub async fn on_update<K: AnnotatedResource>(
        &self,
        old: &K,
        new: &K,
    ) -> (Option<RegistrationOutcome>, Option<RegistrationOutcome>) {
        let deleted = self.on_delete(old).await;
        let added = self.on_add(new).await;
        (deleted, added)
    }
}

fn log_outcome(resource: &WatchedResourceRef, client_id: &str, outcome: &RegistrationOutcome) {
    let kind = resource.kind.as_str();
    let api_version = resource.api_version();
    let namespace = resource.namespace();
    let name = resource.name.as_str();
    match outcome {
        RegistrationOutcome::Created | RegistrationOutcome::Deleted => info!(
            msg = format!("client {outcome}"),
            kind,
            api_version,
            namespace,
            name,
            client_id
        ),
        RegistrationOutcome::AlreadyExisted => warn!(
            msg = "client already exists",
            kind,
            api_version,
            namespace,
            name,
            client_id
        ),
        RegistrationOutcome::NotFound => warn!(
            msg = "client not found, nothing to delete",
            kind,
            api_version,
            namespace,
            name,
            client_id
        ),
        RegistrationOutcome::TransportFailed(detail) => error!(
            msg = "registry call failed",
            kind,
            api_version,
            namespace,
            name,
            client_id,
            detail
        ),
    }
}

#[async_trait]
impl<K> ResourceEventHandler<K> for Reconciler
where
    K: AnnotatedResource + Send + Sync,
{
    async fn on_add(&self, obj: &K) {
        Reconciler::on_add(self, obj).await;
    }

    async fn on_update(&self, old: &K, new: &K) {
        Reconciler::on_update(self, old, new).await;
    }

    async fn on_delete(&self, obj: &K) {
        Reconciler::on_delete(self, obj).await;
    }
}
