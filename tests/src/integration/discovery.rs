//! # Discovery
//!
//! Partial failures, foreign outputs and signing-service outages seen
//! through `refresh`.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use task_tokens::{
        encode_fields, DiscoveryStage, DiscoveryStatus, LockingScript, SigningService,
        TaskListApi, TaskTokenConfig,
    };

    use crate::integration::fixtures::ledger_backed;

    #[tokio::test]
    async fn test_partial_failure_keeps_good_records() {
        let config = TaskTokenConfig::for_testing();
        let (wallet, mut service) = ledger_backed(config.clone());
        for text in ["one", "two", "three"] {
            service.create_task(text, 10).await.unwrap();
        }

        // Not a record at all.
        wallet.store_external_output(&config.basket, 10, LockingScript::from_bytes(vec![0x51]));
        // Right shape, wrong owner key for decryption.
        let owner = wallet
            .get_public_key(&config.derivation_context())
            .await
            .unwrap();
        let script = task_tokens::algorithms::build_locking_script(
            &owner,
            &encode_fields(b"not a ciphertext from this wallet"),
        );
        wallet.store_external_output(&config.basket, 10, script);

        let status = service.refresh().await.unwrap();
        let DiscoveryStatus::Completed(report) = status else {
            panic!("expected completed discovery");
        };

        assert_eq!(report.candidates, 5);
        assert_eq!(report.discovered, 3);
        assert_eq!(report.failures.len(), 2);
        let stages: Vec<_> = report.failures.iter().map(|f| f.stage).collect();
        assert!(stages.contains(&DiscoveryStage::Decode));
        assert!(stages.contains(&DiscoveryStage::Decrypt));
        assert_eq!(service.tasks().len(), 3);
    }

    #[tokio::test]
    async fn test_outage_defers_discovery() {
        let (wallet, mut service) = ledger_backed(TaskTokenConfig::for_testing());
        service.create_task("pending", 10).await.unwrap();
        wallet.set_available(false);

        let status = service.refresh().await.unwrap();

        assert!(matches!(status, DiscoveryStatus::AwaitingService));
        assert_eq!(service.tasks().len(), 1);

        wallet.set_available(true);
        assert!(matches!(
            service.refresh().await.unwrap(),
            DiscoveryStatus::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_other_baskets_ignored() {
        let config = TaskTokenConfig::for_testing();
        let (wallet, mut service) = ledger_backed(config.clone());
        service.create_task("mine", 10).await.unwrap();
        wallet.store_external_output("receipts", 10, LockingScript::from_bytes(vec![0x51]));

        let DiscoveryStatus::Completed(report) = service.refresh().await.unwrap() else {
            panic!("expected completed discovery");
        };

        assert_eq!(report.candidates, 1);
        assert!(report.failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_waits_for_service() {
        let (wallet, service) = ledger_backed(TaskTokenConfig::for_testing());
        wallet.set_available(false);
        let monitor = service.monitor_availability();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!monitor.is_finished());

        wallet.set_available(true);
        let network = monitor.wait_available().await;
        assert!(network.is_some());
    }
}
