//! # Child Key Derivation
//!
//! Child secrets are HMAC-SHA256 of an invoice string under the root secret.
//! Signing and symmetric keys for the same invoice are domain-separated.

use crate::hashing::hmac_sha256;
use crate::symmetric::SecretKey;
use crate::{CryptoError, Secp256k1KeyPair};

const SIGNING_DOMAIN: &[u8] = b"sign:";
const SYMMETRIC_DOMAIN: &[u8] = b"sym:";

fn tagged(domain: &[u8], invoice: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(domain.len() + invoice.len());
    data.extend_from_slice(domain);
    data.extend_from_slice(invoice.as_bytes());
    data
}

/// Derive the secp256k1 child keypair for `invoice`.
pub fn derive_child_secret(root: &[u8; 32], invoice: &str) -> Result<Secp256k1KeyPair, CryptoError> {
    let secret = hmac_sha256(root, &tagged(SIGNING_DOMAIN, invoice))?;
    Secp256k1KeyPair::from_bytes(secret)
}

/// Derive the symmetric key for `invoice`.
pub fn derive_symmetric_key(root: &[u8; 32], invoice: &str) -> Result<SecretKey, CryptoError> {
    let key = hmac_sha256(root, &tagged(SYMMETRIC_DOMAIN, invoice))?;
    Ok(SecretKey::from_bytes(key))
}
