//! # Record Lifecycle
//!
//! Create, list and complete tasks through `TaskListApi`, checking the
//! ledger effects on the in-process signing service.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use task_runtime::{run_session, ServiceContainer, SessionPlan};
    use task_tokens::{
        DiscoveryStatus, TaskListApi, TaskTokenConfig, TaskTokenError, VerificationStatus,
        WorkflowPhase,
    };

    use crate::integration::fixtures::{ledger_backed, reopen};

    #[tokio::test]
    async fn test_create_then_complete_single_task() {
        let (wallet, mut service) = ledger_backed(TaskTokenConfig::for_testing());
        let before = wallet.balance();

        let created = service.create_task("Buy milk", 1000).await.unwrap();
        assert_eq!(
            created.phases,
            vec![
                WorkflowPhase::Idle,
                WorkflowPhase::Assembling,
                WorkflowPhase::Finalizing,
                WorkflowPhase::Committed,
            ]
        );
        assert_eq!(service.tasks()[0].plaintext, "Buy milk");
        assert_eq!(service.tasks()[0].value, 1000);
        assert_eq!(wallet.balance(), before - 1000);
        assert!(wallet.is_unspent(&created.record.identity));

        let redeemed = service
            .complete_task(&created.record.identity)
            .await
            .unwrap();
        assert_eq!(redeemed.value, 1000);
        assert_eq!(redeemed.verification, VerificationStatus::Verified);
        assert_eq!(redeemed.phases.last(), Some(&WorkflowPhase::Committed));
        assert!(redeemed.phases.contains(&WorkflowPhase::AwaitingSignature));

        assert!(service.tasks().is_empty());
        assert!(!wallet.is_unspent(&created.record.identity));
        assert_eq!(wallet.balance(), before);
        assert_eq!(wallet.pending_actions(), 0);
    }

    #[tokio::test]
    async fn test_zero_value_rejected_without_service_calls() {
        let (wallet, mut service) = ledger_backed(TaskTokenConfig::for_testing());
        service.create_task("keep", 5).await.unwrap();
        let calls = wallet.call_count();

        let result = service.create_task("free lunch", 0).await;

        assert!(matches!(result, Err(TaskTokenError::InvalidValue(_))));
        assert_eq!(wallet.call_count(), calls);
        assert_eq!(service.tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let (wallet, mut service) = ledger_backed(TaskTokenConfig::for_testing());
        let calls = wallet.call_count();

        let result = service.create_task("", 10).await;

        assert!(matches!(result, Err(TaskTokenError::EmptyTaskText)));
        assert_eq!(wallet.call_count(), calls);
    }

    #[tokio::test]
    async fn test_identical_inputs_get_distinct_identities() {
        let (_wallet, mut service) = ledger_backed(TaskTokenConfig::for_testing());

        let mut identities = HashSet::new();
        for _ in 0..5 {
            let outcome = service.create_task("same", 7).await.unwrap();
            assert!(identities.insert(outcome.record.identity));
        }
        assert_eq!(service.tasks().len(), 5);
    }

    #[tokio::test]
    async fn test_double_completion_rejected() {
        let (wallet, mut service) = ledger_backed(TaskTokenConfig::for_testing());
        let identity = service.create_task("once", 50).await.unwrap().record.identity;
        service.complete_task(&identity).await.unwrap();
        let balance = wallet.balance();

        let again = service.complete_task(&identity).await;

        assert!(matches!(again, Err(TaskTokenError::AlreadyRedeemed(id)) if id == identity));
        assert_eq!(wallet.balance(), balance);
    }

    #[tokio::test]
    async fn test_stale_record_rejected_by_ledger() {
        let config = TaskTokenConfig::for_testing();
        let (wallet, mut first) = ledger_backed(config.clone());
        let identity = first.create_task("shared", 30).await.unwrap().record.identity;

        // A second view of the same wallet loads the record before it is spent.
        let mut second = reopen(&wallet, config);
        second.refresh().await.unwrap();
        assert!(second.find(&identity).is_some());

        first.complete_task(&identity).await.unwrap();
        let result = second.complete_task(&identity).await;

        assert!(matches!(result, Err(TaskTokenError::Wallet(_))));
        assert_eq!(wallet.pending_actions(), 0);
    }

    #[tokio::test]
    async fn test_records_survive_restart() {
        let config = TaskTokenConfig::for_testing();
        let (wallet, mut service) = ledger_backed(config.clone());
        let r1 = service.create_task("R1", 1).await.unwrap().record.identity;
        let r2 = service.create_task("R2", 2).await.unwrap().record.identity;
        let r3 = service.create_task("R3", 3).await.unwrap().record.identity;
        drop(service);

        let mut restarted = reopen(&wallet, config);
        assert!(restarted.is_loading());
        let status = restarted.refresh().await.unwrap();

        assert!(matches!(status, DiscoveryStatus::Completed(ref r) if r.discovered == 3));
        let order: Vec<_> = restarted.tasks().iter().map(|r| r.identity).collect();
        assert_eq!(order, vec![r3, r2, r1]);
        assert_eq!(restarted.tasks()[1].plaintext, "R2");
    }

    #[tokio::test]
    async fn test_value_conserved_across_many_tasks() {
        let (wallet, mut service) = ledger_backed(TaskTokenConfig::for_testing());
        let before = wallet.balance();

        let mut identities = Vec::new();
        for value in [100u64, 250, 1, 4096] {
            let outcome = service.create_task("task", value).await.unwrap();
            identities.push(outcome.record.identity);
        }
        assert_eq!(wallet.balance(), before - 4447);

        for identity in &identities[..2] {
            service.complete_task(identity).await.unwrap();
        }
        assert_eq!(wallet.balance(), before - 4097);
        assert_eq!(service.tasks().len(), 2);
    }

    #[tokio::test]
    async fn test_runtime_session_end_to_end() {
        let mut container = ServiceContainer::new_for_testing().unwrap();
        let plan = SessionPlan {
            tasks: vec![
                "Buy milk=1000".parse().unwrap(),
                "Water plants=20".parse().unwrap(),
                "Call home=5".parse().unwrap(),
            ],
            complete: 2,
            wait_timeout: Duration::from_secs(5),
        };

        let report = run_session(&mut container, &plan).await.unwrap();

        assert_eq!(report.created.len(), 3);
        let completed: Vec<u64> = report.redeemed.iter().map(|r| r.value).collect();
        assert_eq!(completed, vec![5, 20]);
        assert_eq!(report.remaining.len(), 1);
        assert_eq!(report.remaining[0].plaintext, "Buy milk");
    }
}
