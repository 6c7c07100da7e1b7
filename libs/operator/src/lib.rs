pub mod annotations;
pub mod config;
pub mod error;
pub mod informer;
pub mod ingress;
pub mod reconciler;
pub mod resource;
pub mod supervisor;
pub mod telemetry;
