//! # Scripted Session
//!
//! Runs the record lifecycle end to end: wait for the signing service,
//! discover, create the requested tasks, redeem some of them.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::info;

use task_tokens::{
    parse_task_value, CreateOutcome, DiscoveryStatus, Network, RedeemOutcome, TaskListApi,
    TaskRecord, TaskTokenError,
};

use crate::container::ServiceContainer;

/// One task to create, written `text=value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTask {
    /// Task text.
    pub text: String,
    /// Attached value.
    pub value: u64,
}

impl FromStr for NewTask {
    type Err = TaskTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (text, value) = s
            .rsplit_once('=')
            .ok_or_else(|| TaskTokenError::InvalidValue(format!("{s:?} is not text=value")))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(TaskTokenError::EmptyTaskText);
        }
        Ok(Self {
            text: text.to_string(),
            value: parse_task_value(value)?,
        })
    }
}

/// What a session does.
#[derive(Clone, Debug)]
pub struct SessionPlan {
    /// Tasks to create, in order.
    pub tasks: Vec<NewTask>,
    /// How many of the newest records to redeem afterwards.
    pub complete: usize,
    /// Give up waiting for the signing service after this long.
    pub wait_timeout: Duration,
}

/// What a session did.
#[derive(Clone, Debug, Default)]
pub struct SessionReport {
    /// Network reported by the signing service.
    pub network: Option<Network>,
    /// Records found by the first discovery.
    pub discovered: usize,
    /// Creations.
    pub created: Vec<CreateOutcome>,
    /// Redemptions.
    pub redeemed: Vec<RedeemOutcome>,
    /// Records left at the end, newest first.
    pub remaining: Vec<TaskRecord>,
}

/// Run `plan` against the container's service.
pub async fn run_session(container: &mut ServiceContainer, plan: &SessionPlan) -> Result<SessionReport> {
    let mut report = SessionReport::default();

    let monitor = container.service.monitor_availability();
    let network = tokio::time::timeout(plan.wait_timeout, monitor.wait_available())
        .await
        .context("Timed out waiting for the signing service")?;
    report.network = network;
    info!(network = ?network, "Signing service ready");

    match container.service.refresh().await? {
        DiscoveryStatus::Completed(discovery) => {
            report.discovered = discovery.discovered;
        }
        DiscoveryStatus::AwaitingService => bail!("Signing service became unavailable"),
    }

    for task in &plan.tasks {
        let outcome = container
            .service
            .create_task(&task.text, task.value)
            .await
            .with_context(|| format!("Failed to create task {:?}", task.text))?;
        info!(
            identity = %outcome.record.identity,
            text = %task.text,
            value = task.value,
            "Task created"
        );
        report.created.push(outcome);
    }

    log_tasks(container.service.tasks());

    let targets: Vec<_> = container
        .service
        .tasks()
        .iter()
        .take(plan.complete)
        .map(|r| r.identity)
        .collect();
    for identity in targets {
        let outcome = container
            .service
            .complete_task(&identity)
            .await
            .with_context(|| format!("Failed to complete task {identity}"))?;
        info!(
            identity = %identity,
            value = outcome.value,
            verification = outcome.verification.as_str(),
            "Task completed"
        );
        report.redeemed.push(outcome);
    }

    report.remaining = container.service.tasks().to_vec();
    log_tasks(&report.remaining);
    Ok(report)
}

fn log_tasks(tasks: &[TaskRecord]) {
    info!(count = tasks.len(), "Task list");
    for (position, task) in tasks.iter().enumerate() {
        info!(
            position,
            identity = %task.identity,
            text = %task.plaintext,
            value = task.value,
            "  task"
        );
    }
}
