use crate::error::{Error, Result};

use std::path::{Path, PathBuf};

use tonic::transport::{Certificate, ClientTlsConfig, Identity};
use tracing::debug;

/// PEM files for mutual TLS against the registry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsFiles {
    pub ca_cert: PathBuf,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
}

impl TlsFiles {
    /// Either all three paths are set, or none. Anything in between is rejected.
    pub fn from_paths(
        ca_cert: Option<PathBuf>,
        client_cert: Option<PathBuf>,
        client_key: Option<PathBuf>,
    ) -> Result<Option<Self>> {
        match (ca_cert, client_cert, client_key) {
            (Some(ca_cert), Some(client_cert), Some(client_key)) => Ok(Some(Self {
                ca_cert,
                client_cert,
                client_key,
            })),
            (None, None, None) => Ok(None),
            (ca_cert, client_cert, client_key) => {
                let missing = [
                    ("ca-crt", ca_cert.is_none()),
                    ("client-crt", client_cert.is_none()),
                    ("client-key", client_key.is_none()),
                ]
                .into_iter()
                .filter_map(|(flag, missing)| missing.then_some(flag))
                .collect();
                Err(Error::PartialTlsConfig(missing))
            }
        }
    }

    pub fn load(&self) -> Result<ClientTlsConfig> {
        debug!(
            msg = "loading registry TLS material",
            ca_cert = %self.ca_cert.display(),
            client_cert = %self.client_cert.display(),
        );
        let ca_cert = read_pem(&self.ca_cert)?;
        let client_cert = read_pem(&self.client_cert)?;
        let client_key = read_pem(&self.client_key)?;

        Ok(ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(ca_cert))
            .identity(Identity::from_pem(client_cert, client_key)))
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::TlsMaterial(path.display().to_string(), e))
}
