pub mod api;
pub mod client;
pub mod error;
pub mod tls;
mod types;

pub use client::{DexRegistry, RegistryConfig};
pub use tls::TlsFiles;
pub use types::{ClientIntent, RegistrationOutcome, Registry};
