//! Annotation contract that opts a resource into client registration.

use dexsync_registry::ClientIntent;

use std::collections::BTreeMap;
use std::fmt;

pub const CLIENT_ID_ANNOTATION: &str = "mintel.com/dex-static-client-id";
pub const CLIENT_NAME_ANNOTATION: &str = "mintel.com/dex-static-client-name";
pub const REDIRECT_URI_ANNOTATION: &str = "mintel.com/dex-redirect-uri";
pub const CLIENT_SECRET_ANNOTATION: &str = "mintel.com/dex-static-client-secret";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationKey {
    ClientId,
    ClientName,
    RedirectUri,
    ClientSecret,
}

impl AnnotationKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKey::ClientId => CLIENT_ID_ANNOTATION,
            AnnotationKey::ClientName => CLIENT_NAME_ANNOTATION,
            AnnotationKey::RedirectUri => REDIRECT_URI_ANNOTATION,
            AnnotationKey::ClientSecret => CLIENT_SECRET_ANNOTATION,
        }
    }
}

impl fmt::Display for AnnotationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why no intent could be built from a set of annotations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbsentReason {
    /// No client id annotation at all
    NotOptedIn,
    /// Opted in, but a required annotation is missing or blank
    Misconfigured(AnnotationKey),
}

impl fmt::Display for AbsentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbsentReason::NotOptedIn => write!(f, "missing {CLIENT_ID_ANNOTATION}"),
            AbsentReason::Misconfigured(key) => write!(f, "missing or empty {key}"),
        }
    }
}

pub fn extract(annotations: &BTreeMap<String, String>) -> Result<ClientIntent, AbsentReason> {
    let id = match annotations.get(CLIENT_ID_ANNOTATION) {
        None => return Err(AbsentReason::NotOptedIn),
        Some(id) => non_blank(id).ok_or(AbsentReason::Misconfigured(AnnotationKey::ClientId))?,
    };

    let redirect_uris = annotations
        .get(REDIRECT_URI_ANNOTATION)
        .map(|value| split_redirect_uris(value))
        .filter(|uris| !uris.is_empty())
        .ok_or(AbsentReason::Misconfigured(AnnotationKey::RedirectUri))?;

    let secret = annotations
        .get(CLIENT_SECRET_ANNOTATION)
        .and_then(|secret| non_blank(secret))
        .ok_or(AbsentReason::Misconfigured(AnnotationKey::ClientSecret))?;

    let name = annotations
        .get(CLIENT_NAME_ANNOTATION)
        .and_then(|name| non_blank(name))
        .unwrap_or(id);

    Ok(ClientIntent {
        id: id.to_string(),
        name: name.to_string(),
        redirect_uris,
        secret: secret.to_string(),
    })
}

/// Client id alone, which is all a delete needs
pub fn lookup_client_id(annotations: &BTreeMap<String, String>) -> Option<&str> {
    annotations
        .get(CLIENT_ID_ANNOTATION)
        .and_then(|id| non_blank(id))
}

/// Splits on `,` keeping order and duplicates. Blank segments are dropped.
pub fn split_redirect_uris(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(non_blank)
        .map(str::to_string)
        .collect()
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
