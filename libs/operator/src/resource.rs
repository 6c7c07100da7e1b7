use crate::error::{Error, Result};

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::api::networking::v1::Ingress;
use kube::Resource;
use kube::api::DynamicObject;

/// Kinds a reconciler can be bound to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Ingress,
    ConfigMap,
    Secret,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Ingress => "Ingress",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::Secret => "Secret",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object whose metadata can be projected into a [`WatchedResourceRef`]
pub trait AnnotatedResource: Resource {
    /// Kind carried by the object, if it carries one
    fn declared_kind(&self) -> Option<&str>;

    fn declared_api_version(&self) -> Option<&str>;
}

macro_rules! impl_typed_annotated_resource {
    ($($ty:ty),+) => {
        $(
            impl AnnotatedResource for $ty {
                fn declared_kind(&self) -> Option<&str> {
                    Some(<$ty as k8s_openapi::Resource>::KIND)
                }

                fn declared_api_version(&self) -> Option<&str> {
                    Some(<$ty as k8s_openapi::Resource>::API_VERSION)
                }
            }
        )+
    };
}

impl_typed_annotated_resource!(ConfigMap, Secret, Ingress);

// List responses omit `kind` and `apiVersion` on items, so `types` may be unset.
impl AnnotatedResource for DynamicObject {
    fn declared_kind(&self) -> Option<&str> {
        self.types.as_ref().map(|t| t.kind.as_str())
    }

    fn declared_api_version(&self) -> Option<&str> {
        self.types.as_ref().map(|t| t.api_version.as_str())
    }
}

/// Per event view of a watched object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchedResourceRef {
    pub kind: ResourceKind,
    pub api_version: Option<String>,
    pub name: String,
    pub namespace: Option<String>,
    pub annotations: BTreeMap<String, String>,
}

impl WatchedResourceRef {
    pub fn project<K: AnnotatedResource>(kind: ResourceKind, obj: &K) -> Result<Self> {
        if let Some(found) = obj.declared_kind() {
            if found != kind.as_str() {
                return Err(Error::UnexpectedKind {
                    expected: kind.as_str(),
                    found: found.to_string(),
                });
            }
        }
        let meta = obj.meta();
        let name = meta.name.clone().ok_or(Error::MissingObjectKey("name"))?;
        Ok(Self {
            kind,
            api_version: obj.declared_api_version().map(str::to_string),
            name,
            namespace: meta.namespace.clone(),
            annotations: meta.annotations.clone().unwrap_or_default(),
        })
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or_default()
    }

    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or("unknown")
    }
}
