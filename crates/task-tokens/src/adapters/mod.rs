//! # Adapters
//!
//! Reference implementations of the outbound ports.

pub mod ledger_verifier;
pub mod local_wallet;

pub use ledger_verifier::{decode_bundle, LedgerChainVerifier};
pub use local_wallet::LocalSigningService;
