//! # Shared Crypto - Primitives for the Reference Signing Service
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `symmetric` | XChaCha20-Poly1305 | Record payload encryption |
//! | `hashing` | SHA-256, double SHA-256 | Transaction ids, signature digests |
//! | `derivation` | HMAC-SHA256 | Per-protocol child keys |
//! | `ecdsa` | secp256k1 | Locking keys and unlocking proofs |
//!
//! ## Security Properties
//!
//! - **XChaCha20**: 192-bit random nonce, sealed as `nonce || ciphertext`
//! - **secp256k1**: RFC 6979 deterministic, low-S signatures, DER on the wire
//! - **Derivation**: child secrets never leave the process that holds the root

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod derivation;
pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod symmetric;

// Re-exports
pub use derivation::{derive_child_secret, derive_symmetric_key};
pub use ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
pub use errors::CryptoError;
pub use hashing::{hmac_sha256, sha256, sha256d, Hash};
pub use symmetric::{decrypt, encrypt, open, seal, Nonce, SecretKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
