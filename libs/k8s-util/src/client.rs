use crate::error::{Error, Result};

use std::path::PathBuf;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

/// Origin of the Kubernetes client configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KubeConfigSource {
    /// Service account mounted in the pod
    InCluster,
    /// Explicit kubeconfig file
    Kubeconfig(PathBuf),
    /// `KUBECONFIG`, `~/.kube/config` or in-cluster, in that order
    Infer,
}

impl KubeConfigSource {
    /// `in_cluster` takes precedence over an explicit kubeconfig path.
    pub fn from_flags(in_cluster: bool, kubeconfig: Option<PathBuf>) -> Self {
        match (in_cluster, kubeconfig) {
            (true, _) => Self::InCluster,
            (false, Some(path)) => Self::Kubeconfig(path),
            (false, None) => Self::Infer,
        }
    }

    pub async fn load(&self) -> Result<Config> {
        match self {
            Self::InCluster => {
                debug!(msg = "loading in-cluster kubernetes configuration");
                Config::incluster().map_err(|e| {
                    Error::InClusterError(
                        "failed to load in-cluster configuration".to_string(),
                        Box::new(e),
                    )
                })
            }
            Self::Kubeconfig(path) => {
                debug!(msg = "loading kubeconfig", path = %path.display());
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    Error::KubeconfigError(
                        format!("failed to read kubeconfig {}", path.display()),
                        Box::new(e),
                    )
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        Error::KubeconfigError(
                            format!("invalid kubeconfig {}", path.display()),
                            Box::new(e),
                        )
                    })
            }
            Self::Infer => Config::infer().await.map_err(|e| {
                Error::InferConfigError(
                    "failed to infer kubernetes configuration".to_string(),
                    Box::new(e),
                )
            }),
        }
    }
}

pub async fn new_client(source: &KubeConfigSource) -> Result<Client> {
    let config = source.load().await?;
    Client::try_from(config).map_err(|e| {
        Error::KubeError(
            "failed to build kubernetes client".to_string(),
            Box::new(e),
        )
    })
}
