//! # Task Token Service
//!
//! Application service wiring the orchestrator and the catalog behind the
//! `TaskListApi` port.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use task_telemetry::{metric_inc, DISCOVERY_RUNS};
use tracing::{debug, error, info};

use super::availability::AvailabilityMonitor;
use super::catalog::{discover, RecordCatalog};
use super::orchestrator::TransactionOrchestrator;
use crate::config::TaskTokenConfig;
use crate::domain::{
    CreateOutcome, DiscoveryStatus, Outpoint, RedeemOutcome, TaskRecord, TaskTokenError,
};
use crate::ports::{ChainVerifier, ListOutputsArgs, SigningService, TaskListApi};

/// Task Token Service - the user's task list backed by ledger records.
pub struct TaskTokenService<W: SigningService> {
    /// Configuration.
    config: TaskTokenConfig,
    /// Signing service handle.
    service: Arc<W>,
    /// Create and redeem workflows.
    orchestrator: TransactionOrchestrator<W>,
    /// Records, newest first.
    catalog: RecordCatalog,
}

impl<W: SigningService> TaskTokenService<W> {
    /// Create a new service.
    pub fn new(config: TaskTokenConfig, service: Arc<W>) -> Result<Self, TaskTokenError> {
        config.validate()?;
        Ok(Self {
            orchestrator: TransactionOrchestrator::new(config.clone(), Arc::clone(&service)),
            config,
            service,
            catalog: RecordCatalog::new(),
        })
    }

    /// Attach a chain verifier for evidence checks at redemption.
    pub fn with_verifier(mut self, verifier: Arc<dyn ChainVerifier>) -> Self {
        self.orchestrator = self.orchestrator.with_verifier(verifier);
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &TaskTokenConfig {
        &self.config
    }

    /// The catalog.
    pub fn catalog(&self) -> &RecordCatalog {
        &self.catalog
    }

    fn list_args(&self) -> ListOutputsArgs {
        ListOutputsArgs {
            basket: self.config.basket.clone(),
            include_evidence: true,
            limit: self.config.list_limit,
        }
    }
}

impl<W: SigningService + 'static> TaskTokenService<W> {
    /// Start polling the signing service at the configured interval.
    pub fn monitor_availability(&self) -> AvailabilityMonitor {
        AvailabilityMonitor::spawn(
            Arc::clone(&self.service),
            Duration::from_millis(self.config.poll_interval_ms),
        )
    }
}

#[async_trait]
impl<W: SigningService> TaskListApi for TaskTokenService<W> {
    async fn refresh(&mut self) -> Result<DiscoveryStatus, TaskTokenError> {
        let discovered = discover(
            self.service.as_ref(),
            self.orchestrator.encryption(),
            self.list_args(),
        )
        .await;

        match discovered {
            Ok((mut records, report)) => {
                // The store may still list outputs whose spend is queued.
                records.retain(|r| !self.orchestrator.was_redeemed(&r.identity));
                self.catalog.replace(records);
                metric_inc!(DISCOVERY_RUNS, &["completed"]);
                info!(
                    discovered = report.discovered,
                    failed = report.failures.len(),
                    "Task list refreshed"
                );
                Ok(DiscoveryStatus::Completed(report))
            }
            Err(e) if e.is_service_unavailable() => {
                metric_inc!(DISCOVERY_RUNS, &["awaiting_service"]);
                debug!(error = %e, "Signing service not ready, discovery deferred");
                Ok(DiscoveryStatus::AwaitingService)
            }
            Err(e) => {
                metric_inc!(DISCOVERY_RUNS, &["failed"]);
                error!(error = %e, "Discovery failed");
                Err(e)
            }
        }
    }

    async fn create_task(
        &mut self,
        text: &str,
        value: u64,
    ) -> Result<CreateOutcome, TaskTokenError> {
        let outcome = self.orchestrator.create(text, value).await?;
        self.catalog.insert(outcome.record.clone());
        Ok(outcome)
    }

    async fn complete_task(
        &mut self,
        identity: &Outpoint,
    ) -> Result<RedeemOutcome, TaskTokenError> {
        if self.orchestrator.was_redeemed(identity) {
            return Err(TaskTokenError::AlreadyRedeemed(*identity));
        }
        let record = self
            .catalog
            .find(identity)
            .cloned()
            .ok_or(TaskTokenError::RecordNotFound(*identity))?;

        let outcome = self.orchestrator.redeem(&record).await?;
        self.catalog.remove(identity);
        Ok(outcome)
    }

    fn tasks(&self) -> &[TaskRecord] {
        self.catalog.records()
    }

    fn find(&self, identity: &Outpoint) -> Option<&TaskRecord> {
        self.catalog.find(identity)
    }

    fn is_loading(&self) -> bool {
        self.catalog.is_loading()
    }
}
