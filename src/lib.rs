pub mod authz;
pub mod client;
pub mod config;
pub mod errors;
pub mod jwt;
pub mod matrix;
pub mod menu;
pub mod models;
pub mod navigator;
pub mod services;
pub mod session;

// Re-export commonly used items for tests
pub use client::ApiClient;
pub use config::ClientConfig;
pub use errors::{ClientError, ClientResult};
