use crate::error::Result;

use std::fmt;

use async_trait::async_trait;

/// Desired registration of one OAuth2 client
#[derive(Clone, PartialEq, Eq)]
pub struct ClientIntent {
    pub id: String,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub secret: String,
}

impl fmt::Debug for ClientIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIntent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("redirect_uris", &self.redirect_uris)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Result of a single registry call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Created,
    AlreadyExisted,
    Deleted,
    NotFound,
    TransportFailed(String),
}

impl RegistrationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationOutcome::Created => "created",
            RegistrationOutcome::AlreadyExisted => "already_existed",
            RegistrationOutcome::Deleted => "deleted",
            RegistrationOutcome::NotFound => "not_found",
            RegistrationOutcome::TransportFailed(_) => "transport_failed",
        }
    }

    /// `AlreadyExisted` and `NotFound` are soft outcomes, not failures.
    pub fn is_failure(&self) -> bool {
        matches!(self, RegistrationOutcome::TransportFailed(_))
    }
}

impl fmt::Display for RegistrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationOutcome::TransportFailed(detail) => {
                write!(f, "{}: {detail}", self.as_str())
            }
            _ => f.write_str(self.as_str()),
        }
    }
}

/// External OAuth2 client registry
///
/// Implementations must be safe to share between every watch loop of the process.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn create(&self, intent: &ClientIntent) -> RegistrationOutcome;

    async fn delete(&self, id: &str) -> RegistrationOutcome;

    /// Server version, used as connectivity check
    async fn version(&self) -> Result<String>;
}
