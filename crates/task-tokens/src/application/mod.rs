//! # Application Layer
//!
//! Workflows and the service that exposes them.

pub mod availability;
pub mod catalog;
pub mod encryption;
pub mod orchestrator;
pub mod script_builder;
pub mod service;

pub use availability::{AvailabilityMonitor, AvailabilityStatus};
pub use catalog::{discover, RecordCatalog};
pub use encryption::EncryptionAdapter;
pub use orchestrator::TransactionOrchestrator;
pub use script_builder::{RecordUnlocker, ScriptBuilder};
pub use service::TaskTokenService;
