//! # Domain Entities
//!
//! Task records, the create/redeem workflow state machine and the results
//! reported by the orchestrator and the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::{Hash, TaskTokenError};
use super::script::LockingScript;
use super::value_objects::{EvidenceBundle, Outpoint};

/// A task token: encrypted task text bound to a value-bearing ledger output.
///
/// Immutable between creation and redemption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Ledger position holding the record.
    pub identity: Outpoint,
    /// Decrypted task text.
    pub plaintext: String,
    /// Attached value.
    pub value: u64,
    /// Spending condition committing to the marker and ciphertext.
    pub locking_script: LockingScript,
    /// Transaction plus ancestry proving `identity`.
    pub evidence: EvidenceBundle,
}

/// Which workflow a state machine tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkflowKind {
    /// Record creation.
    Create,
    /// Record redemption.
    Redeem,
}

impl WorkflowKind {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Redeem => "redeem",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowPhase {
    /// Nothing started.
    Idle,
    /// Building scripts and describing the transaction.
    Assembling,
    /// Holding a signable skeleton from the signing service.
    AwaitingSignature,
    /// Signing service is completing the transaction.
    Finalizing,
    /// Transaction accepted.
    Committed,
    /// Workflow aborted with an error.
    Failed,
}

impl WorkflowPhase {
    /// Committed or failed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }
}

/// State machine for one create or redeem invocation.
#[derive(Clone, Debug)]
pub struct Workflow {
    kind: WorkflowKind,
    phase: WorkflowPhase,
    history: Vec<WorkflowPhase>,
}

impl Workflow {
    /// New workflow in `Idle`.
    pub fn new(kind: WorkflowKind) -> Self {
        Self {
            kind,
            phase: WorkflowPhase::Idle,
            history: vec![WorkflowPhase::Idle],
        }
    }

    /// Workflow kind.
    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    /// Current phase.
    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    /// Every phase visited, in order.
    pub fn history(&self) -> &[WorkflowPhase] {
        &self.history
    }

    /// Move to `to` if the transition is legal for this workflow.
    pub fn advance(&mut self, to: WorkflowPhase) -> Result<(), TaskTokenError> {
        use WorkflowPhase::*;

        let allowed = match (self.phase, to) {
            (Idle, Assembling) => true,
            (Assembling, AwaitingSignature) => self.kind == WorkflowKind::Redeem,
            (Assembling, Finalizing) => self.kind == WorkflowKind::Create,
            (AwaitingSignature, Finalizing) => true,
            (Finalizing, Committed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        };

        if !allowed {
            return Err(TaskTokenError::InvalidTransition {
                from: self.phase,
                to,
            });
        }

        tracing::debug!(
            workflow = %self.kind,
            from = ?self.phase,
            to = ?to,
            "Workflow phase change"
        );
        self.phase = to;
        self.history.push(to);
        Ok(())
    }

    /// Mark the workflow failed. No-op once terminal.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            // Non-terminal to Failed is always legal.
            let _ = self.advance(WorkflowPhase::Failed);
        }
    }
}

/// Result of a successful creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateOutcome {
    /// The new record, already decrypted.
    pub record: TaskRecord,
    /// Transaction id of the creating transaction.
    pub txid: Hash,
    /// Phases visited.
    pub phases: Vec<WorkflowPhase>,
}

/// Outcome of checking a record's evidence before redemption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Verifier accepted the bundle.
    Verified,
    /// Verifier rejected the bundle or errored.
    Failed {
        /// Verifier's reason.
        reason: String,
    },
    /// Verification disabled by policy.
    Skipped,
    /// Verification wanted but no verifier attached.
    Unavailable,
}

impl VerificationStatus {
    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Failed { .. } => "failed",
            Self::Skipped => "skipped",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Result of a successful redemption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedeemOutcome {
    /// Identity that was consumed.
    pub identity: Outpoint,
    /// Transaction id of the spending transaction.
    pub txid: Hash,
    /// Value returned to the owner.
    pub value: u64,
    /// Evidence check result.
    pub verification: VerificationStatus,
    /// Phases visited.
    pub phases: Vec<WorkflowPhase>,
}

/// Where a discovery candidate failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiscoveryStage {
    /// Listed output carried no locking script.
    MissingScript,
    /// Script is not a record of this protocol.
    Decode,
    /// Ciphertext did not decrypt to text.
    Decrypt,
}

impl DiscoveryStage {
    /// Metric label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingScript => "missing_script",
            Self::Decode => "decode",
            Self::Decrypt => "decrypt",
        }
    }
}

/// A candidate dropped during discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryFailure {
    /// Candidate outpoint.
    pub identity: Outpoint,
    /// Failing stage.
    pub stage: DiscoveryStage,
    /// Underlying error.
    pub error: TaskTokenError,
}

/// Summary of one completed discovery pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Candidates returned by the store.
    pub candidates: usize,
    /// Records kept.
    pub discovered: usize,
    /// Candidates dropped.
    pub failures: Vec<DiscoveryFailure>,
}

/// Result of a discovery attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryStatus {
    /// Catalog replaced.
    Completed(DiscoveryReport),
    /// Signing service not ready; catalog untouched, still loading.
    AwaitingService,
}
