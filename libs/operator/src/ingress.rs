use crate::error::Result;

use dexsync_k8s_util::discovery::{
    api_group_resources, group_serves_version, has_resource, served_api_groups,
};

use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIGroupList;
use kube::Client;
use kube::api::ApiResource;
use kube::core::GroupVersionKind;
use tracing::{debug, info};

pub const INGRESS_KIND: &str = "Ingress";
pub const INGRESS_PLURAL: &str = "ingresses";

/// API group and version an Ingress can be served under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IngressSurface {
    ExtensionsV1beta1,
    NetworkingV1beta1,
    NetworkingV1,
}

impl IngressSurface {
    pub const ALL: [IngressSurface; 3] = [
        IngressSurface::ExtensionsV1beta1,
        IngressSurface::NetworkingV1beta1,
        IngressSurface::NetworkingV1,
    ];

    pub fn group(&self) -> &'static str {
        match self {
            IngressSurface::ExtensionsV1beta1 => "extensions",
            IngressSurface::NetworkingV1beta1 | IngressSurface::NetworkingV1 => {
                "networking.k8s.io"
            }
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            IngressSurface::ExtensionsV1beta1 | IngressSurface::NetworkingV1beta1 => "v1beta1",
            IngressSurface::NetworkingV1 => "v1",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            IngressSurface::ExtensionsV1beta1 => "extensions/v1beta1",
            IngressSurface::NetworkingV1beta1 => "networking.k8s.io/v1beta1",
            IngressSurface::NetworkingV1 => "networking.k8s.io/v1",
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk(self.group(), self.version(), INGRESS_KIND),
            INGRESS_PLURAL,
        )
    }
}

impl fmt::Display for IngressSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_version())
    }
}

/// Surfaces whose group version is listed in `GET /apis`, in [`IngressSurface::ALL`] order
pub fn advertised_surfaces(groups: &APIGroupList) -> Vec<IngressSurface> {
    IngressSurface::ALL
        .into_iter()
        .filter(|surface| group_serves_version(groups, surface.group(), surface.version()))
        .collect()
}

/// Probes the cluster once for the Ingress surfaces it actually serves
pub async fn discover_surfaces(client: &Client) -> Result<Vec<IngressSurface>> {
    let groups = served_api_groups(client).await?;
    let mut surfaces = Vec::new();
    for surface in advertised_surfaces(&groups) {
        let resources = api_group_resources(client, surface.api_version()).await?;
        if has_resource(&resources, INGRESS_PLURAL) {
            info!(msg = "ingress API served", api_version = surface.api_version());
            surfaces.push(surface);
        } else {
            debug!(
                msg = "group version served without ingresses",
                api_version = surface.api_version()
            );
        }
    }
    Ok(surfaces)
}

#[cfg(test)]
mod tests {
    use super::{IngressSurface, advertised_surfaces, discover_surfaces};

    use http::{Request, Response};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIGroupList;
    use kube::{Client, client::Body};
    use serde_json::{Value, json};

    type ApiServerHandle = tower_test::mock::Handle<Request<Body>, Response<Body>>;

    struct ApiServerVerifier(ApiServerHandle);

    enum Scenario {
        /// Modern cluster serving `networking.k8s.io/v1` only
        NetworkingV1Only,
        /// Cluster serving both networking versions, `extensions/v1beta1` without ingresses
        NetworkingV1AndV1beta1,
    }

    fn group(name: &str, versions: &[&str]) -> Value {
        json!({
            "name": name,
            "versions": versions
                .iter()
                .map(|v| json!({"groupVersion": format!("{name}/{v}"), "version": v}))
                .collect::<Vec<_>>(),
        })
    }

    fn group_list(groups: Vec<Value>) -> Value {
        json!({"kind": "APIGroupList", "apiVersion": "v1", "groups": groups})
    }

    fn resource_list(group_version: &str, names: &[&str]) -> Value {
        json!({
            "kind": "APIResourceList",
            "apiVersion": "v1",
            "groupVersion": group_version,
            "resources": names
                .iter()
                .map(|n| json!({"name": n, "singularName": "", "namespaced": true, "kind": "Ingress", "verbs": ["list", "watch"]}))
                .collect::<Vec<_>>(),
        })
    }

    impl ApiServerVerifier {
        fn run(self, scenario: Scenario) -> tokio::task::JoinHandle<()> {
            tokio::spawn(async move {
                match scenario {
                    Scenario::NetworkingV1Only => {
                        self.handle_get(
                            "/apis",
                            group_list(vec![
                                group("apps", &["v1"]),
                                group("networking.k8s.io", &["v1"]),
                            ]),
                        )
                        .await
                        .handle_get(
                            "/apis/networking.k8s.io/v1",
                            resource_list("networking.k8s.io/v1", &["ingresses", "ingresses/status"]),
                        )
                        .await;
                    }
                    Scenario::NetworkingV1AndV1beta1 => {
                        self.handle_get(
                            "/apis",
                            group_list(vec![
                                group("extensions", &["v1beta1"]),
                                group("networking.k8s.io", &["v1", "v1beta1"]),
                            ]),
                        )
                        .await
                        .handle_get(
                            "/apis/extensions/v1beta1",
                            resource_list("extensions/v1beta1", &["networkpolicies"]),
                        )
                        .await
                        .handle_get(
                            "/apis/networking.k8s.io/v1beta1",
                            resource_list("networking.k8s.io/v1beta1", &["ingresses"]),
                        )
                        .await
                        .handle_get(
                            "/apis/networking.k8s.io/v1",
                            resource_list("networking.k8s.io/v1", &["ingresses"]),
                        )
                        .await;
                    }
                }
            })
        }

        async fn handle_get(mut self, path: &str, body: Value) -> Self {
            let (request, send) = self.0.next_request().await.expect("service not called");
            assert_eq!(request.method(), http::Method::GET);
            assert_eq!(request.uri().path(), path);
            let body = serde_json::to_vec(&body).unwrap();
            send.send_response(Response::builder().body(Body::from(body)).unwrap());
            self
        }
    }

    fn testcontext() -> (Client, ApiServerVerifier) {
        let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        (
            Client::new(mock_service, "default"),
            ApiServerVerifier(handle),
        )
    }

    async fn timeout_after_1s(handle: tokio::task::JoinHandle<()>) {
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("timeout on mock apiserver")
            .expect("scenario succeeded")
    }

    #[test]
    fn test_surface_coordinates() {
        let ar = IngressSurface::ExtensionsV1beta1.api_resource();
        assert_eq!(ar.api_version, "extensions/v1beta1");
        assert_eq!(ar.kind, "Ingress");
        assert_eq!(ar.plural, "ingresses");
        assert_eq!(
            IngressSurface::NetworkingV1.api_resource().api_version,
            IngressSurface::NetworkingV1.api_version()
        );
        assert_eq!(IngressSurface::NetworkingV1beta1.group(), "networking.k8s.io");
    }

    #[test]
    fn test_advertised_surfaces() {
        let groups: APIGroupList = serde_json::from_value(group_list(vec![
            group("extensions", &["v1beta1"]),
            group("networking.k8s.io", &["v1"]),
        ]))
        .unwrap();
        assert_eq!(
            advertised_surfaces(&groups),
            vec![IngressSurface::ExtensionsV1beta1, IngressSurface::NetworkingV1]
        );

        let empty: APIGroupList = serde_json::from_value(group_list(vec![])).unwrap();
        assert!(advertised_surfaces(&empty).is_empty());
    }

    #[tokio::test]
    async fn test_discover_networking_v1_only() {
        let (client, fakeserver) = testcontext();
        let mocksrv = fakeserver.run(Scenario::NetworkingV1Only);
        let surfaces = discover_surfaces(&client).await.expect("discovery succeeds");
        assert_eq!(surfaces, vec![IngressSurface::NetworkingV1]);
        timeout_after_1s(mocksrv).await;
    }

    #[tokio::test]
    async fn test_discover_both_networking_versions() {
        let (client, fakeserver) = testcontext();
        let mocksrv = fakeserver.run(Scenario::NetworkingV1AndV1beta1);
        let surfaces = discover_surfaces(&client).await.expect("discovery succeeds");
        assert_eq!(
            surfaces,
            vec![IngressSurface::NetworkingV1beta1, IngressSurface::NetworkingV1]
        );
        timeout_after_1s(mocksrv).await;
    }
}
