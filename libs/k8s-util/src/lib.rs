pub mod client;
pub mod discovery;
pub mod error;
