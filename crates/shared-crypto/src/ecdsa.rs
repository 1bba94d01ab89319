//! # ECDSA Signatures (secp256k1)
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S signatures, DER encoded when placed in unlocking scripts
//!
//! ## Use Cases
//!
//! - Owner keys committed in record locking scripts
//! - Unlocking proofs over transaction signature digests

use crate::CryptoError;
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use zeroize::Zeroize;

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Secp256k1PublicKey([u8; 33]);

impl Secp256k1PublicKey {
    /// Create from compressed bytes (33 bytes, starting with 0x02 or 0x03).
    pub fn from_bytes(bytes: [u8; 33]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Create from a slice that must hold exactly one compressed point.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; 33] = bytes.try_into().map_err(|_| CryptoError::InvalidPublicKey)?;
        Self::from_bytes(array)
    }

    /// Get raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Verify a signature.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &Secp256k1Signature,
    ) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig =
            Signature::from_slice(&signature.0).map_err(|_| CryptoError::InvalidSignatureFormat)?;

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }

    /// Verify a DER-encoded signature.
    pub fn verify_der(&self, message: &[u8], der: &[u8]) -> Result<(), CryptoError> {
        let signature = Secp256k1Signature::from_der(der)?;
        self.verify(message, &signature)
    }
}

/// ECDSA signature (64 bytes, r||s format).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1Signature([u8; 64]);

impl Secp256k1Signature {
    /// Create from bytes (64 bytes).
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Parse a DER-encoded signature.
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let sig = Signature::from_der(der).map_err(|_| CryptoError::InvalidSignatureFormat)?;
        Ok(Self(sig.to_bytes().into()))
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// DER encoding.
    pub fn to_der(&self) -> Result<Vec<u8>, CryptoError> {
        let sig = Signature::from_slice(&self.0).map_err(|_| CryptoError::InvalidSignatureFormat)?;
        Ok(sig.to_der().as_bytes().to_vec())
    }
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Get public key (compressed, 33 bytes).
    pub fn public_key(&self) -> Secp256k1PublicKey {
        // SEC1 encoding from k256 is compressed: 0x02/0x03 prefix plus x.
        let sec1_bytes = self.signing_key.verifying_key().to_sec1_bytes();
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&sec1_bytes[..33]);
        Secp256k1PublicKey(bytes)
    }

    /// Sign a message (deterministic RFC 6979).
    pub fn sign(&self, message: &[u8]) -> Secp256k1Signature {
        let sig: Signature = self.signing_key.sign(message);
        let sig = sig.normalize_s().unwrap_or(sig);
        Secp256k1Signature(sig.to_bytes().into())
    }

    /// Sign and return the DER encoding.
    pub fn sign_der(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.sign(message).to_der()
    }

    /// Get secret key bytes (for serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = Secp256k1KeyPair::generate();
        let message = b"spend digest";

        let signature = keypair.sign(message);
        assert!(keypair.public_key().verify(message, &signature).is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let keypair = Secp256k1KeyPair::generate();

        let signature = keypair.sign(b"message1");
        let result = keypair.public_key().verify(b"message2", &signature);

        assert!(result.is_err());
    }

    #[test]
    fn test_der_roundtrip_verifies() {
        let keypair = Secp256k1KeyPair::from_bytes([0xABu8; 32]).unwrap();
        let der = keypair.sign_der(b"digest").unwrap();

        assert_eq!(der[0], 0x30);
        assert!(keypair.public_key().verify_der(b"digest", &der).is_ok());
    }

    #[test]
    fn test_garbage_der_rejected() {
        let keypair = Secp256k1KeyPair::generate();
        let result = keypair.public_key().verify_der(b"digest", &[0x30, 0x01, 0x00]);
        assert!(matches!(result, Err(CryptoError::InvalidSignatureFormat)));
    }

    #[test]
    fn test_public_key_from_slice_length() {
        let keypair = Secp256k1KeyPair::generate();
        let bytes = keypair.public_key();
        assert!(Secp256k1PublicKey::from_slice(bytes.as_bytes()).is_ok());
        assert!(Secp256k1PublicKey::from_slice(&bytes.as_bytes()[..32]).is_err());
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = Secp256k1KeyPair::from_bytes([0xABu8; 32]).unwrap();

        let sig1 = keypair.sign(b"deterministic test");
        let sig2 = keypair.sign(b"deterministic test");

        assert_eq!(sig1.as_bytes(), sig2.as_bytes());
    }
}
