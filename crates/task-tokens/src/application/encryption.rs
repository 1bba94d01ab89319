//! # Encryption Adapter
//!
//! Text-to-ciphertext conversion under the fixed protocol and key context.
//! The cryptography itself happens inside the signing service.

use std::sync::Arc;

use crate::domain::{DerivationContext, TaskTokenError};
use crate::ports::SigningService;

/// Encrypts task text for the owner and decrypts it back.
pub struct EncryptionAdapter<W: SigningService> {
    service: Arc<W>,
    context: DerivationContext,
}

impl<W: SigningService> Clone for EncryptionAdapter<W> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            context: self.context.clone(),
        }
    }
}

impl<W: SigningService> EncryptionAdapter<W> {
    /// Adapter bound to `context`.
    pub fn new(service: Arc<W>, context: DerivationContext) -> Self {
        Self { service, context }
    }

    /// Context used for both directions.
    pub fn context(&self) -> &DerivationContext {
        &self.context
    }

    /// Encrypt task text.
    pub async fn encrypt_text(&self, plaintext: &str) -> Result<Vec<u8>, TaskTokenError> {
        self.service
            .encrypt(plaintext.as_bytes(), &self.context)
            .await
    }

    /// Decrypt task text.
    ///
    /// Service unavailability passes through unchanged; every other failure
    /// becomes `DecryptionFailed`.
    pub async fn decrypt_text(&self, ciphertext: &[u8]) -> Result<String, TaskTokenError> {
        let bytes = self
            .service
            .decrypt(ciphertext, &self.context)
            .await
            .map_err(|e| match e {
                TaskTokenError::ServiceUnavailable(_) | TaskTokenError::DecryptionFailed(_) => e,
                other => TaskTokenError::DecryptionFailed(other.to_string()),
            })?;

        String::from_utf8(bytes).map_err(|_| TaskTokenError::InvalidPlaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LocalSigningService;
    use crate::config::TaskTokenConfig;
    use crate::domain::{ProtocolId, SecurityLevel};
    use proptest::prelude::*;

    fn adapter(wallet: Arc<LocalSigningService>) -> EncryptionAdapter<LocalSigningService> {
        EncryptionAdapter::new(wallet, TaskTokenConfig::default().derivation_context())
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let enc = adapter(Arc::new(LocalSigningService::for_testing()));
        let ciphertext = enc.encrypt_text("Buy milk").await.unwrap();

        assert_ne!(ciphertext, b"Buy milk");
        assert_eq!(enc.decrypt_text(&ciphertext).await.unwrap(), "Buy milk");
    }

    #[tokio::test]
    async fn test_other_context_cannot_decrypt() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        let enc = adapter(Arc::clone(&wallet));
        let other = EncryptionAdapter::new(
            wallet,
            DerivationContext::owner(ProtocolId::new(SecurityLevel::Silent, "todo list"), "2"),
        );

        let ciphertext = enc.encrypt_text("Buy milk").await.unwrap();
        assert!(matches!(
            other.decrypt_text(&ciphertext).await,
            Err(TaskTokenError::DecryptionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_other_owner_cannot_decrypt() {
        let enc = adapter(Arc::new(LocalSigningService::from_seed([1u8; 32])));
        let stranger = adapter(Arc::new(LocalSigningService::from_seed([2u8; 32])));

        let ciphertext = enc.encrypt_text("secret").await.unwrap();
        assert!(stranger.decrypt_text(&ciphertext).await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable_passes_through() {
        let wallet = Arc::new(LocalSigningService::for_testing());
        wallet.set_available(false);
        let err = adapter(wallet).decrypt_text(&[1u8; 48]).await.unwrap_err();
        assert!(err.is_service_unavailable());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_roundtrip(text in "\\PC{0,200}") {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let enc = adapter(Arc::new(LocalSigningService::for_testing()));
            let decrypted = rt.block_on(async {
                let ciphertext = enc.encrypt_text(&text).await.unwrap();
                enc.decrypt_text(&ciphertext).await.unwrap()
            });
            prop_assert_eq!(decrypted, text);
        }
    }
}
