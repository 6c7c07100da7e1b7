use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("partial TLS configuration, missing: {}", .0.join(", "))]
    PartialTlsConfig(Vec<&'static str>),

    #[error("failed to read TLS material {0}: {1}")]
    TlsMaterial(String, #[source] std::io::Error),

    #[error("invalid registry address {0}: {1}")]
    InvalidAddress(String, #[source] Box<tonic::transport::Error>),

    #[error("{0}: {1}")]
    Transport(String, #[source] Box<tonic::transport::Error>),

    #[error("{0}: {1}")]
    Rpc(String, #[source] Box<tonic::Status>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
