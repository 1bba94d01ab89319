//! # Inbound Ports
//!
//! API trait defining what the task list can do.

use async_trait::async_trait;

use crate::domain::{
    CreateOutcome, DiscoveryStatus, Outpoint, RedeemOutcome, TaskRecord, TaskTokenError,
};

/// Task list API - inbound port.
#[async_trait]
pub trait TaskListApi: Send + Sync {
    /// Rediscover records from the signing service's store.
    ///
    /// Per-record failures are reported, not returned. An unreachable
    /// service yields `AwaitingService` and leaves the list loading.
    async fn refresh(&mut self) -> Result<DiscoveryStatus, TaskTokenError>;

    /// Create a record for `text` carrying `value`, newest first in the list.
    async fn create_task(&mut self, text: &str, value: u64)
        -> Result<CreateOutcome, TaskTokenError>;

    /// Redeem a record and drop it from the list.
    async fn complete_task(&mut self, identity: &Outpoint)
        -> Result<RedeemOutcome, TaskTokenError>;

    /// Current records, newest first.
    fn tasks(&self) -> &[TaskRecord];

    /// Look up a record by identity.
    fn find(&self, identity: &Outpoint) -> Option<&TaskRecord>;

    /// True until a discovery pass completes.
    fn is_loading(&self) -> bool;
}
