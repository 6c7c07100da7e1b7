use dexsync_k8s_util::client::{KubeConfigSource, new_client};
use dexsync_operator::config::{ControllerConfig, DEFAULT_LABEL_SELECTOR};
use dexsync_operator::supervisor::Supervisor;
use dexsync_operator::telemetry;
use dexsync_registry::client::DEFAULT_ADDRESS;
use dexsync_registry::{DexRegistry, Registry, RegistryConfig, TlsFiles};

use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{Router, get};
use clap::{ArgAction, Parser, crate_authors, crate_description, crate_version};
use rustls::crypto::aws_lc_rs::default_provider;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "dexsync",
    about = crate_description!(),
    version = crate_version!(),
    author = crate_authors!("\n"),
)]
struct Args {
    /// Use the service account of the pod to reach the API server
    #[arg(long, env)]
    in_cluster: bool,

    /// Path to a kubeconfig file. When neither this nor `--in-cluster` is set, the
    /// configuration is inferred from the environment.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Address of the Dex gRPC API, `host:port` or a full URI
    #[arg(long, default_value = DEFAULT_ADDRESS, env)]
    dex_grpc_address: String,

    /// CA certificate used to verify the Dex gRPC server
    #[arg(long, env)]
    ca_crt: Option<PathBuf>,

    /// Client certificate presented to the Dex gRPC server
    #[arg(long, env)]
    client_crt: Option<PathBuf>,

    /// Private key of the client certificate
    #[arg(long, env)]
    client_key: Option<PathBuf>,

    /// Watch Ingresses under every API version the cluster serves
    #[arg(
        long,
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        env
    )]
    enable_ingress_controller: bool,

    /// Watch ConfigMaps matching `--label-selector`
    #[arg(long, env)]
    enable_configmap_controller: bool,

    /// Watch Secrets matching `--label-selector`
    #[arg(long, env)]
    enable_secret_controller: bool,

    /// Label selector narrowing the ConfigMap and Secret watches
    #[arg(long, default_value = DEFAULT_LABEL_SELECTOR, env)]
    label_selector: String,

    /// Seconds between redeliveries of every cached object
    #[arg(long, default_value_t = 1800, value_parser = clap::value_parser!(u64).range(1..), env)]
    resync_period: u64,

    /// Listen on given port
    #[arg(short, long, default_value_t = 8080, env)]
    port: u16,

    /// Set logging filter directive for `tracing_subscriber::filter::EnvFilter`. Example: "info,kube=debug,dexsync_operator=debug"
    #[arg(long, default_value = "info", env)]
    log_filter: String,

    /// Set log format
    #[arg(long, value_enum, default_value_t = telemetry::LogFormat::Text, env)]
    log_format: telemetry::LogFormat,
}

#[derive(Clone)]
struct HealthState {
    registry: Arc<dyn Registry>,
}

async fn livez() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz(State(state): State<HealthState>) -> impl IntoResponse {
    match state.registry.version().await {
        Ok(version) => (StatusCode::OK, version).into_response(),
        Err(e) => {
            warn!(msg = "registry not reachable", %e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let args: Args = Args::parse();

    telemetry::init(&args.log_filter, args.log_format)?;

    let source = KubeConfigSource::from_flags(args.in_cluster, args.kubeconfig);
    let client = new_client(&source).await?;

    let registry_config = RegistryConfig {
        address: args.dex_grpc_address,
        tls: TlsFiles::from_paths(args.ca_crt, args.client_crt, args.client_key)?,
    };
    let registry: Arc<dyn Registry> = Arc::new(DexRegistry::connect(&registry_config)?);
    match registry.version().await {
        Ok(version) => info!(
            msg = "connected to Dex",
            address = registry_config.address,
            version
        ),
        Err(e) => {
            error!(
                msg = "failed to reach Dex",
                address = registry_config.address,
                %e
            );
            return Err(e.into());
        }
    }

    let config = ControllerConfig {
        ingress: args.enable_ingress_controller,
        config_maps: args.enable_configmap_controller,
        secrets: args.enable_secret_controller,
        label_selector: args.label_selector,
        resync_period: Duration::from_secs(args.resync_period),
    };
    let supervisor = Supervisor::new(client, registry.clone(), config);
    let token = supervisor.shutdown_token();

    let signal_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!(msg = "received shutdown signal, stopping watch loops");
        signal_token.cancel();
    });

    let app = Router::new()
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .with_state(HealthState { registry });

    let listener = TcpListener::bind(format!("0.0.0.0:{}", args.port)).await?;
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(token.clone().cancelled_owned())
        .into_future();

    let watches = async {
        let result = supervisor.start().await;
        // stop the health server when watches fail to start
        token.cancel();
        result
    };

    let (watched, served) = tokio::join!(watches, server);
    watched?;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    let mut sigterm =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM signal handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(test)]
mod tests {
    use super::Args;

    use clap::Parser;

    #[test]
    fn test_ingress_controller_flag() {
        let args = Args::try_parse_from(["dexsync"]).unwrap();
        assert!(args.enable_ingress_controller);

        let args = Args::try_parse_from(["dexsync", "--enable-ingress-controller"]).unwrap();
        assert!(args.enable_ingress_controller);

        let args =
            Args::try_parse_from(["dexsync", "--enable-ingress-controller", "false"]).unwrap();
        assert!(!args.enable_ingress_controller);

        let args = Args::try_parse_from(["dexsync", "--enable-ingress-controller=false"]).unwrap();
        assert!(!args.enable_ingress_controller);
    }

    #[test]
    fn test_resync_period_must_be_positive() {
        assert!(Args::try_parse_from(["dexsync", "--resync-period", "0"]).is_err());
        let args = Args::try_parse_from(["dexsync", "--resync-period", "60"]).unwrap();
        assert_eq!(args.resync_period, 60);
    }
}
