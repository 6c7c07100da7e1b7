use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}: {1:?}")]
    KubeError(String, #[source] Box<kube::Error>),

    #[error("{0}: {1}")]
    KubeconfigError(String, #[source] Box<kube::config::KubeconfigError>),

    #[error("{0}: {1}")]
    InferConfigError(String, #[source] Box<kube::config::InferConfigError>),

    #[error("{0}: {1}")]
    InClusterError(String, #[source] Box<kube::config::InClusterError>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
