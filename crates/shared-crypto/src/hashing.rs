//! # SHA-256 Hashing
//!
//! Transaction ids and signature digests use double SHA-256.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::CryptoError;

/// 256-bit hash output.
pub type Hash = [u8; 32];

type HmacSha256 = Hmac<Sha256>;

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Double SHA-256, as used for transaction ids and sighash digests.
pub fn sha256d(data: &[u8]) -> Hash {
    sha256(&sha256(data))
}

/// HMAC-SHA256 of `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Hash, CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let hash = sha256(b"abc");
        assert_eq!(
            hex::encode(hash),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256d_differs_from_single() {
        assert_ne!(sha256(b"task"), sha256d(b"task"));
        assert_eq!(sha256d(b"task"), sha256(&sha256(b"task")));
    }

    #[test]
    fn test_hmac_keyed() {
        let h1 = hmac_sha256(b"key-a", b"data").unwrap();
        let h2 = hmac_sha256(b"key-a", b"data").unwrap();
        let h3 = hmac_sha256(b"key-b", b"data").unwrap();

        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
    }
}
