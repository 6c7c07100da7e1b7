use crate::config::ControllerConfig;
use crate::error::Result;
use crate::informer::Informer;
use crate::ingress::{IngressSurface, discover_surfaces};
use crate::reconciler::Reconciler;
use crate::resource::ResourceKind;

use dexsync_registry::Registry;

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{Api, DynamicObject};
use kube::client::Client;
use kube::runtime::watcher;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// One (kind, api version) pair to watch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchTarget {
    Ingress(IngressSurface),
    ConfigMap,
    Secret,
}

impl WatchTarget {
    pub fn kind(&self) -> ResourceKind {
        match self {
            WatchTarget::Ingress(_) => ResourceKind::Ingress,
            WatchTarget::ConfigMap => ResourceKind::ConfigMap,
            WatchTarget::Secret => ResourceKind::Secret,
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            WatchTarget::Ingress(surface) => surface.api_version(),
            WatchTarget::ConfigMap | WatchTarget::Secret => "v1",
        }
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.api_version())
    }
}

/// Watches to start for the enabled kinds. `surfaces` are only used when Ingress is enabled.
pub fn plan_watches(config: &ControllerConfig, surfaces: &[IngressSurface]) -> Vec<WatchTarget> {
    let mut targets = Vec::new();
    if config.ingress {
        targets.extend(surfaces.iter().copied().map(WatchTarget::Ingress));
    }
    if config.config_maps {
        targets.push(WatchTarget::ConfigMap);
    }
    if config.secrets {
        targets.push(WatchTarget::Secret);
    }
    targets
}

/// Owns every watch loop of the process
pub struct Supervisor {
    client: Client,
    registry: Arc<dyn Registry>,
    config: ControllerConfig,
    token: CancellationToken,
}

impl Supervisor {
    pub fn new(client: Client, registry: Arc<dyn Registry>, config: ControllerConfig) -> Self {
        Self {
            client,
            registry,
            config,
            token: CancellationToken::new(),
        }
    }

    /// Cancelling it stops every watch loop
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs until the shutdown token is cancelled
    pub async fn start(self) -> Result<()> {
        let surfaces = if self.config.ingress {
            discover_surfaces(&self.client).await?
        } else {
            Vec::new()
        };
        if self.config.ingress && surfaces.is_empty() {
            warn!(msg = "ingress controller enabled, but the cluster serves no Ingress API");
        }

        let targets = plan_watches(&self.config, &surfaces);
        if targets.is_empty() {
            warn!(msg = "no controller enabled, waiting for shutdown");
        }
        let watches = self.watches(&targets);
        info!(
            msg = format!("starting {} watch loops", watches.len()),
            targets = ?targets.iter().map(ToString::to_string).collect::<Vec<_>>(),
        );
        futures::future::join_all(watches).await;
        // a loop whose stream terminated is not restarted, health is served until shutdown
        self.token.cancelled().await;
        info!(msg = "all watch loops stopped");
        Ok(())
    }

    fn watches(&self, targets: &[WatchTarget]) -> Vec<BoxFuture<'static, ()>> {
        let ingress = Arc::new(Reconciler::new(
            ResourceKind::Ingress,
            self.registry.clone(),
        ));
        let config_maps = Arc::new(Reconciler::new(
            ResourceKind::ConfigMap,
            self.registry.clone(),
        ));
        let secrets = Arc::new(Reconciler::new(ResourceKind::Secret, self.registry.clone()));
        let labeled = watcher::Config::default().labels(&self.config.label_selector);
        let resync_period = self.config.resync_period;

        targets
            .iter()
            .map(|target| match target {
                WatchTarget::Ingress(IngressSurface::NetworkingV1) => Informer::new(
                    target.to_string(),
                    Api::<Ingress>::all(self.client.clone()),
                    watcher::Config::default(),
                    (),
                    resync_period,
                    ingress.clone(),
                )
                .run(self.token.clone())
                .boxed(),
                // legacy surfaces have no typed counterpart
                WatchTarget::Ingress(surface) => {
                    let ar = surface.api_resource();
                    Informer::new(
                        target.to_string(),
                        Api::<DynamicObject>::all_with(self.client.clone(), &ar),
                        watcher::Config::default(),
                        ar,
                        resync_period,
                        ingress.clone(),
                    )
                    .run(self.token.clone())
                    .boxed()
                }
                WatchTarget::ConfigMap => Informer::new(
                    target.to_string(),
                    Api::<ConfigMap>::all(self.client.clone()),
                    labeled.clone(),
                    (),
                    resync_period,
                    config_maps.clone(),
                )
                .run(self.token.clone())
                .boxed(),
                WatchTarget::Secret => Informer::new(
                    target.to_string(),
                    Api::<Secret>::all(self.client.clone()),
                    labeled.clone(),
                    (),
                    resync_period,
                    secrets.clone(),
                )
                .run(self.token.clone())
                .boxed(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Supervisor, WatchTarget, plan_watches};

    use crate::config::ControllerConfig;
    use crate::ingress::IngressSurface;
    use crate::resource::ResourceKind;

    use dexsync_registry::error::Result;
    use dexsync_registry::{ClientIntent, RegistrationOutcome, Registry};

    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use http::{Request, Response};
    use kube::{Client, client::Body};
    use serde_json::json;

    type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

    struct NoopRegistry;

    #[async_trait]
    impl Registry for NoopRegistry {
        async fn create(&self, _intent: &ClientIntent) -> RegistrationOutcome {
            RegistrationOutcome::Created
        }

        async fn delete(&self, _id: &str) -> RegistrationOutcome {
            RegistrationOutcome::Deleted
        }

        async fn version(&self) -> Result<String> {
            Ok("v2.41.1".to_string())
        }
    }

    fn testcontext(config: ControllerConfig) -> (Supervisor, ApiServerHandle) {
        let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let client = Client::new(mock_service, "default");
        (
            Supervisor::new(client, Arc::new(NoopRegistry), config),
            handle,
        )
    }

    async fn respond(handle: &mut ApiServerHandle, path: &str, body: serde_json::Value) {
        let (request, send) = handle.next_request().await.expect("service not called");
        assert_eq!(request.uri().path(), path);
        send.send_response(
            Response::builder()
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        );
    }

    async fn timeout_after_1s<T>(future: impl Future<Output = T>) -> T {
        tokio::time::timeout(Duration::from_secs(1), future)
            .await
            .expect("timeout on mock apiserver")
    }

    #[tokio::test]
    async fn test_config_map_watch_uses_label_selector() {
        let (supervisor, mut handle) = testcontext(ControllerConfig {
            ingress: false,
            config_maps: true,
            ..ControllerConfig::default()
        });
        let token = supervisor.shutdown_token();
        let running = tokio::spawn(supervisor.start());

        let (request, _send) = timeout_after_1s(handle.next_request())
            .await
            .expect("service not called");
        assert_eq!(request.uri().path(), "/api/v1/configmaps");
        let query = request.uri().query().unwrap_or_default();
        assert!(
            query.contains("labelSelector=mintel.com%2Fdex-k8s-dynamic-clients%3Denabled"),
            "unexpected query: {query}"
        );

        token.cancel();
        timeout_after_1s(running)
            .await
            .expect("supervisor task")
            .expect("supervisor stopped cleanly");
    }

    #[tokio::test]
    async fn test_ingress_watch_is_not_label_scoped() {
        let (supervisor, mut handle) = testcontext(ControllerConfig::default());
        let token = supervisor.shutdown_token();
        let running = tokio::spawn(supervisor.start());

        timeout_after_1s(respond(
            &mut handle,
            "/apis",
            json!({
                "kind": "APIGroupList",
                "apiVersion": "v1",
                "groups": [{
                    "name": "networking.k8s.io",
                    "versions": [{"groupVersion": "networking.k8s.io/v1", "version": "v1"}]
                }]
            }),
        ))
        .await;
        timeout_after_1s(respond(
            &mut handle,
            "/apis/networking.k8s.io/v1",
            json!({
                "kind": "APIResourceList",
                "apiVersion": "v1",
                "groupVersion": "networking.k8s.io/v1",
                "resources": [{
                    "name": "ingresses",
                    "singularName": "ingress",
                    "namespaced": true,
                    "kind": "Ingress",
                    "verbs": ["list", "watch"]
                }]
            }),
        ))
        .await;

        let (request, _send) = timeout_after_1s(handle.next_request())
            .await
            .expect("service not called");
        assert_eq!(request.uri().path(), "/apis/networking.k8s.io/v1/ingresses");
        let query = request.uri().query().unwrap_or_default();
        assert!(!query.contains("labelSelector"), "unexpected query: {query}");

        token.cancel();
        timeout_after_1s(running)
            .await
            .expect("supervisor task")
            .expect("supervisor stopped cleanly");
    }

    #[test]
    fn test_default_plan_watches_ingresses_only() {
        let plan = plan_watches(&ControllerConfig::default(), &[IngressSurface::NetworkingV1]);
        assert_eq!(plan, vec![WatchTarget::Ingress(IngressSurface::NetworkingV1)]);
    }

    #[test]
    fn test_plan_one_loop_per_surface() {
        let config = ControllerConfig {
            config_maps: true,
            secrets: true,
            ..ControllerConfig::default()
        };
        let plan = plan_watches(
            &config,
            &[IngressSurface::NetworkingV1beta1, IngressSurface::NetworkingV1],
        );
        assert_eq!(
            plan,
            vec![
                WatchTarget::Ingress(IngressSurface::NetworkingV1beta1),
                WatchTarget::Ingress(IngressSurface::NetworkingV1),
                WatchTarget::ConfigMap,
                WatchTarget::Secret,
            ]
        );
        assert!(
            plan[..2]
                .iter()
                .all(|target| target.kind() == ResourceKind::Ingress)
        );
    }

    #[test]
    fn test_plan_ignores_surfaces_when_ingress_disabled() {
        let config = ControllerConfig {
            ingress: false,
            secrets: true,
            ..ControllerConfig::default()
        };
        assert_eq!(
            plan_watches(&config, &[IngressSurface::NetworkingV1]),
            vec![WatchTarget::Secret]
        );
    }

    #[test]
    fn test_plan_nothing_enabled() {
        let config = ControllerConfig {
            ingress: false,
            ..ControllerConfig::default()
        };
        assert!(plan_watches(&config, &[]).is_empty());
    }

    #[test]
    fn test_target_display() {
        assert_eq!(
            WatchTarget::Ingress(IngressSurface::ExtensionsV1beta1).to_string(),
            "Ingress extensions/v1beta1"
        );
        assert_eq!(WatchTarget::Secret.to_string(), "Secret v1");
    }
}
