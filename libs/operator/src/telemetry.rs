use crate::error::{Error, Result};

use clap::ValueEnum;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Installs the global subscriber. `log_filter` uses `EnvFilter` directives, e.g.
/// `info,dexsync_operator=debug`.
pub fn init(log_filter: &str, log_format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(log_filter)
        .map_err(|e| Error::ParseError(format!("invalid log filter `{log_filter}`: {e}")))?;
    let subscriber = Registry::default().with(filter);

    let result = match log_format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().flatten_event(true))
            .try_init(),
        LogFormat::Text => subscriber.with(fmt::layer()).try_init(),
    };
    result.map_err(|e| Error::TelemetryInit(e.to_string()))
}
