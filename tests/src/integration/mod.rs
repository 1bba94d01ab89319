//! Cross-component flows over the in-process signing service.

pub mod discovery;
pub mod evidence;
pub mod lifecycle;

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use task_tokens::{
        ChainVerifier, LedgerChainVerifier, LocalSigningService, TaskTokenConfig,
        TaskTokenService,
    };

    pub type Service = TaskTokenService<LocalSigningService>;

    /// Funded wallet plus a service checking evidence against it.
    pub fn ledger_backed(config: TaskTokenConfig) -> (Arc<LocalSigningService>, Service) {
        let wallet = Arc::new(LocalSigningService::for_testing());
        let verifier: Arc<dyn ChainVerifier> =
            Arc::new(LedgerChainVerifier::new(Arc::clone(&wallet)));
        let service = TaskTokenService::new(config, Arc::clone(&wallet))
            .expect("valid config")
            .with_verifier(verifier);
        (wallet, service)
    }

    /// Second service over the same wallet, as after a restart.
    pub fn reopen(wallet: &Arc<LocalSigningService>, config: TaskTokenConfig) -> Service {
        let verifier: Arc<dyn ChainVerifier> =
            Arc::new(LedgerChainVerifier::new(Arc::clone(wallet)));
        TaskTokenService::new(config, Arc::clone(wallet))
            .expect("valid config")
            .with_verifier(verifier)
    }
}
