use crate::error::{Error, Result};

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroupList, APIResourceList};
use kube::Client;
use tracing::trace;

/// Returns the API groups advertised by the server (`GET /apis`)
pub async fn served_api_groups(client: &Client) -> Result<APIGroupList> {
    client.list_api_groups().await.map_err(|e| {
        Error::KubeError("failed to list served API groups".to_string(), Box::new(e))
    })
}

/// Returns the resources served under a group version (`GET /apis/{group}/{version}`)
pub async fn api_group_resources(client: &Client, api_version: &str) -> Result<APIResourceList> {
    client
        .list_api_group_resources(api_version)
        .await
        .map_err(|e| {
            Error::KubeError(
                format!("failed to list resources served under {api_version}"),
                Box::new(e),
            )
        })
}

pub fn group_serves_version(groups: &APIGroupList, group: &str, version: &str) -> bool {
    let served = groups
        .groups
        .iter()
        .filter(|g| g.name == group)
        .flat_map(|g| g.versions.iter())
        .any(|v| v.version == version);
    trace!(msg = "group version lookup", group, version, served);
    served
}

/// Subresources such as `ingresses/status` are not matched.
pub fn has_resource(resources: &APIResourceList, plural: &str) -> bool {
    resources.resources.iter().any(|r| r.name == plural)
}
