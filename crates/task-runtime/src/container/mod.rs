//! # Container
//!
//! Configuration and service wiring for the runtime.

pub mod config;
pub mod services;

pub use config::{ConfigError, RuntimeConfig, WalletConfig};
pub use services::ServiceContainer;
