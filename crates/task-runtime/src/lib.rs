//! # Task Runtime Library
//!
//! Service wiring and the scripted session, exposed for tests. The main
//! entry point is the `main.rs` binary.

#![warn(missing_docs)]

pub mod container;
pub mod session;

pub use container::{RuntimeConfig, ServiceContainer};
pub use session::{run_session, NewTask, SessionPlan, SessionReport};
