use crate::api::dex_client::DexClient;
use crate::api::{
    self, CreateClientReq, CreateClientResp, DeleteClientReq, DeleteClientResp, VersionReq,
};
use crate::error::{Error, Result};
use crate::tls::TlsFiles;
use crate::types::{ClientIntent, RegistrationOutcome, Registry};

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};
use tonic::{Response, Status};
use tracing::{debug, trace};

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:5557";

/// Connection settings of the Dex gRPC API
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    /// `host:port`, or a full URI
    pub address: String,
    pub tls: Option<TlsFiles>,
}

impl RegistryConfig {
    fn uri(&self) -> String {
        if self.address.contains("://") {
            return self.address.clone();
        }
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        format!("{scheme}://{}", self.address)
    }

    pub fn endpoint(&self) -> Result<Endpoint> {
        let uri = self.uri();
        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| Error::InvalidAddress(uri, Box::new(e)))?;
        match &self.tls {
            Some(files) => endpoint.tls_config(files.load()?).map_err(|e| {
                Error::Transport("invalid registry TLS configuration".to_string(), Box::new(e))
            }),
            None => Ok(endpoint),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            tls: None,
        }
    }
}

/// [`Registry`] backed by the Dex gRPC API
#[derive(Clone, Debug)]
pub struct DexRegistry {
    client: DexClient<Channel>,
}

impl DexRegistry {
    /// The channel connects on first use and reconnects transparently afterwards. Must be
    /// called within a Tokio runtime.
    pub fn connect(config: &RegistryConfig) -> Result<Self> {
        let endpoint = config.endpoint()?;
        debug!(
            msg = "registry channel configured",
            uri = %endpoint.uri(),
            tls = config.tls.is_some()
        );
        Ok(Self {
            client: DexClient::new(endpoint.connect_lazy()),
        })
    }
}

#[async_trait]
impl Registry for DexRegistry {
    async fn create(&self, intent: &ClientIntent) -> RegistrationOutcome {
        trace!(msg = "create client", id = %intent.id);
        let request = CreateClientReq {
            client: Some(api::Client {
                id: intent.id.clone(),
                name: intent.name.clone(),
                secret: intent.secret.clone(),
                redirect_uris: intent.redirect_uris.clone(),
                ..Default::default()
            }),
        };
        create_outcome(self.client.clone().create_client(request).await)
    }

    async fn delete(&self, id: &str) -> RegistrationOutcome {
        trace!(msg = "delete client", id);
        let request = DeleteClientReq {
            id: id.to_string(),
        };
        delete_outcome(self.client.clone().delete_client(request).await)
    }

    async fn version(&self) -> Result<String> {
        self.client
            .clone()
            .get_version(VersionReq {})
            .await
            .map(|response| response.into_inner().server)
            .map_err(|status| {
                Error::Rpc("failed to get Dex version".to_string(), Box::new(status))
            })
    }
}

fn create_outcome(result: Result<Response<CreateClientResp>, Status>) -> RegistrationOutcome {
    match result {
        Ok(response) if response.get_ref().already_exists => RegistrationOutcome::AlreadyExisted,
        Ok(_) => RegistrationOutcome::Created,
        Err(status) => RegistrationOutcome::TransportFailed(status_detail(&status)),
    }
}

fn delete_outcome(result: Result<Response<DeleteClientResp>, Status>) -> RegistrationOutcome {
    match result {
        Ok(response) if response.get_ref().not_found => RegistrationOutcome::NotFound,
        Ok(_) => RegistrationOutcome::Deleted,
        Err(status) => RegistrationOutcome::TransportFailed(status_detail(&status)),
    }
}

fn status_detail(status: &Status) -> String {
    format!("{:?}: {}", status.code(), status.message())
}
