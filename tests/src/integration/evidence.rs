//! # Evidence Policy
//!
//! Redemption against the ledger verifier under each policy, with intact
//! and tampered evidence bundles.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use task_tokens::{
        decode_bundle, ChainVerifier, EvidenceBundle, EvidencePolicy, LedgerChainVerifier,
        LocalSigningService, TaskRecord, TaskTokenConfig, TaskTokenError,
        TransactionOrchestrator, VerificationStatus,
    };

    fn orchestrator(
        policy: EvidencePolicy,
        with_verifier: bool,
    ) -> (Arc<LocalSigningService>, TransactionOrchestrator<LocalSigningService>) {
        let wallet = Arc::new(LocalSigningService::for_testing());
        let config = TaskTokenConfig {
            evidence_policy: policy,
            ..TaskTokenConfig::for_testing()
        };
        let mut orchestrator = TransactionOrchestrator::new(config, Arc::clone(&wallet));
        if with_verifier {
            let verifier: Arc<dyn ChainVerifier> =
                Arc::new(LedgerChainVerifier::new(Arc::clone(&wallet)));
            orchestrator = orchestrator.with_verifier(verifier);
        }
        (wallet, orchestrator)
    }

    fn tampered(mut record: TaskRecord) -> TaskRecord {
        record.evidence = EvidenceBundle::new(vec![0xde, 0xad, 0xbe, 0xef]);
        record
    }

    #[tokio::test]
    async fn test_created_record_carries_verifiable_evidence() {
        let (wallet, orchestrator) = orchestrator(EvidencePolicy::Enforce, true);
        let record = orchestrator.create("proof", 10).await.unwrap().record;

        let transactions = decode_bundle(&record.evidence).unwrap();
        assert_eq!(transactions[0].txid(), record.identity.txid);

        let verifier = LedgerChainVerifier::new(Arc::clone(&wallet));
        assert!(verifier.verify(&record.evidence, true).await.unwrap());
    }

    #[tokio::test]
    async fn test_enforce_rejects_tampered_evidence_before_spending() {
        let (wallet, mut orchestrator) = orchestrator(EvidencePolicy::Enforce, true);
        let record = orchestrator.create("guarded", 40).await.unwrap().record;
        let calls = wallet.call_count();

        let result = orchestrator.redeem(&tampered(record.clone())).await;

        assert!(matches!(result, Err(TaskTokenError::VerificationFailed(_))));
        assert_eq!(wallet.call_count(), calls);
        assert_eq!(wallet.pending_actions(), 0);
        assert!(wallet.is_unspent(&record.identity));
        assert!(!orchestrator.was_redeemed(&record.identity));

        // The intact record still redeems.
        let outcome = orchestrator.redeem(&record).await.unwrap();
        assert_eq!(outcome.verification, VerificationStatus::Verified);
    }

    #[tokio::test]
    async fn test_warn_reports_failure_and_finalizes() {
        let (wallet, mut orchestrator) = orchestrator(EvidencePolicy::Warn, true);
        let record = orchestrator.create("lenient", 40).await.unwrap().record;

        let outcome = orchestrator.redeem(&tampered(record.clone())).await.unwrap();

        assert!(matches!(outcome.verification, VerificationStatus::Failed { .. }));
        assert!(!wallet.is_unspent(&record.identity));
    }

    #[tokio::test]
    async fn test_empty_bundle_counts_as_failure() {
        let (_wallet, mut orchestrator) = orchestrator(EvidencePolicy::Enforce, true);
        let mut record = orchestrator.create("bare", 40).await.unwrap().record;
        record.evidence = EvidenceBundle::default();

        let result = orchestrator.redeem(&record).await;

        assert!(matches!(result, Err(TaskTokenError::VerificationFailed(_))));
    }

    #[tokio::test]
    async fn test_skip_never_consults_verifier() {
        let (_wallet, mut orchestrator) = orchestrator(EvidencePolicy::Skip, true);
        let record = orchestrator.create("trusting", 40).await.unwrap().record;

        let outcome = orchestrator.redeem(&tampered(record)).await.unwrap();

        assert_eq!(outcome.verification, VerificationStatus::Skipped);
    }

    #[tokio::test]
    async fn test_missing_verifier_reports_unavailable() {
        let (_wallet, mut orchestrator) = orchestrator(EvidencePolicy::Enforce, false);
        let record = orchestrator.create("unverified", 40).await.unwrap().record;

        let outcome = orchestrator.redeem(&record).await.unwrap();

        assert_eq!(outcome.verification, VerificationStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_verifier_rejects_unknown_transactions() {
        let (_wallet, orchestrator) = orchestrator(EvidencePolicy::Enforce, true);
        let record = orchestrator.create("elsewhere", 40).await.unwrap().record;

        // A different ledger never saw these transactions.
        let other = Arc::new(LocalSigningService::from_seed([9u8; 32]));
        let verifier = LedgerChainVerifier::new(other);

        assert!(!verifier.verify(&record.evidence, false).await.unwrap());
    }
}
