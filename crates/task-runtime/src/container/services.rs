//! # Service Container
//!
//! Builds the signing service, the chain verifier and the task-token
//! service in dependency order.

use std::sync::Arc;

use task_tokens::{
    ChainVerifier, EvidencePolicy, LedgerChainVerifier, LocalSigningService, TaskTokenError,
    TaskTokenService,
};
use tracing::info;

use crate::container::config::RuntimeConfig;

/// Wired services for one runtime.
pub struct ServiceContainer {
    /// In-process signing service.
    pub wallet: Arc<LocalSigningService>,
    /// Task list.
    pub service: TaskTokenService<LocalSigningService>,
    /// Runtime configuration.
    pub config: RuntimeConfig,
}

impl ServiceContainer {
    /// Build every service from `config`.
    pub fn new(config: RuntimeConfig) -> Result<Self, TaskTokenError> {
        let wallet = match config.wallet.seed {
            Some(seed) => LocalSigningService::from_seed(seed),
            None => LocalSigningService::generate(),
        }
        .with_fee(config.wallet.fee);
        let wallet = Arc::new(wallet);

        if config.wallet.funding > 0 {
            wallet.fund(config.wallet.funding)?;
        }

        let mut service = TaskTokenService::new(config.tokens.clone(), Arc::clone(&wallet))?;
        if config.tokens.evidence_policy != EvidencePolicy::Skip {
            let verifier: Arc<dyn ChainVerifier> =
                Arc::new(LedgerChainVerifier::new(Arc::clone(&wallet)));
            service = service.with_verifier(verifier);
        }

        info!(
            basket = %config.tokens.basket,
            evidence_policy = %config.tokens.evidence_policy,
            funding = config.wallet.funding,
            "Services initialized"
        );

        Ok(Self {
            wallet,
            service,
            config,
        })
    }

    /// Container with a fixed seed and funded wallet.
    pub fn new_for_testing() -> Result<Self, TaskTokenError> {
        let mut config = RuntimeConfig::default();
        config.tokens = task_tokens::TaskTokenConfig::for_testing();
        config.wallet.seed = Some([7u8; 32]);
        config.wallet.funding = 100_000;
        Self::new(config)
    }
}
