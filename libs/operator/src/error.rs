use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    K8sUtil(#[from] dexsync_k8s_util::error::Error),

    #[error("unexpected object kind: expected {expected}, found {found}")]
    UnexpectedKind {
        expected: &'static str,
        found: String,
    },

    #[error("object has no {0}")]
    MissingObjectKey(&'static str),

    #[error("failed to initialize telemetry: {0}")]
    TelemetryInit(String),

    #[error("parse error: {0}")]
    ParseError(String),
}
pub type Result<T, E = Error> = std::result::Result<T, E>;
