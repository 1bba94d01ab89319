//! # Domain Module
//!
//! Core domain types for task tokens.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod script;
pub mod transaction;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use script::{LockingScript, ScriptChunk, UnlockingScript};
pub use transaction::*;
pub use value_objects::*;
