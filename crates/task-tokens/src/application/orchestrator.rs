//! # Transaction Orchestrator
//!
//! Drives the create and redeem workflows through their phases:
//!
//! ```text
//! create: Idle -> Assembling -> Finalizing -> Committed
//! redeem: Idle -> Assembling -> AwaitingSignature -> Finalizing -> Committed
//! ```
//!
//! Any error moves the workflow to `Failed` and is returned unchanged.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use task_telemetry::{
    log_record_event, log_workflow_event, metric_inc, WorkflowTimer, EVIDENCE_VERIFICATIONS,
    RECORDS_CREATED, RECORDS_REDEEMED, WORKFLOW_FAILURES,
};
use tracing::warn;

use super::encryption::EncryptionAdapter;
use super::script_builder::{RecordUnlocker, ScriptBuilder};
use crate::algorithms::encode_fields;
use crate::config::{EvidencePolicy, TaskTokenConfig};
use crate::domain::{
    validate_task_text, validate_task_value, CreateOutcome, DerivationContext, Outpoint,
    RedeemOutcome, SighashType, TaskRecord, TaskTokenError, VerificationStatus, Workflow,
    WorkflowKind, WorkflowPhase,
};
use crate::ports::{
    ActionInput, ActionOptions, ActionOutput, ChainVerifier, CreateActionArgs, SignActionArgs,
    SignableTransaction, SigningService,
};

/// Output description attached to a new record.
const RECORD_OUTPUT_DESCRIPTION: &str = "New ToDo list item";
/// Input description attached to a redeemed record.
const RECORD_INPUT_DESCRIPTION: &str = "Complete a ToDo list item";

/// Runs create and redeem workflows against the signing service.
pub struct TransactionOrchestrator<W: SigningService> {
    config: TaskTokenConfig,
    context: DerivationContext,
    service: Arc<W>,
    verifier: Option<Arc<dyn ChainVerifier>>,
    encryption: EncryptionAdapter<W>,
    scripts: ScriptBuilder<W>,
    redeemed: HashSet<Outpoint>,
}

impl<W: SigningService> TransactionOrchestrator<W> {
    /// Orchestrator without a chain verifier.
    pub fn new(config: TaskTokenConfig, service: Arc<W>) -> Self {
        let context = config.derivation_context();
        Self {
            encryption: EncryptionAdapter::new(Arc::clone(&service), context.clone()),
            scripts: ScriptBuilder::new(Arc::clone(&service)),
            config,
            context,
            service,
            verifier: None,
            redeemed: HashSet::new(),
        }
    }

    /// Attach a chain verifier for evidence checks.
    pub fn with_verifier(mut self, verifier: Arc<dyn ChainVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Encryption adapter shared with discovery.
    pub fn encryption(&self) -> &EncryptionAdapter<W> {
        &self.encryption
    }

    /// Whether this client already redeemed `identity`.
    pub fn was_redeemed(&self, identity: &Outpoint) -> bool {
        self.redeemed.contains(identity)
    }

    fn options(&self) -> ActionOptions {
        ActionOptions {
            accept_delayed_broadcast: self.config.accept_delayed_broadcast,
            randomize_outputs: false,
        }
    }

    /// Create a record for `text` carrying `value`.
    ///
    /// Input is validated before any call to the signing service.
    pub async fn create(&self, text: &str, value: u64) -> Result<CreateOutcome, TaskTokenError> {
        validate_task_text(text)?;
        validate_task_value(value)?;

        let _timer = WorkflowTimer::start(WorkflowKind::Create.as_str());
        let mut workflow = Workflow::new(WorkflowKind::Create);

        match self.run_create(&mut workflow, text, value).await {
            Ok(outcome) => {
                metric_inc!(RECORDS_CREATED);
                log_record_event!(info, "Task record created", outcome.record.identity, value = value);
                Ok(outcome)
            }
            Err(e) => Err(self.fail(&mut workflow, e)),
        }
    }

    async fn run_create(
        &self,
        workflow: &mut Workflow,
        text: &str,
        value: u64,
    ) -> Result<CreateOutcome, TaskTokenError> {
        workflow.advance(WorkflowPhase::Assembling)?;
        let ciphertext = self.encryption.encrypt_text(text).await?;
        let locking_script = self
            .scripts
            .lock(&encode_fields(&ciphertext), &self.context)
            .await?;

        let args = CreateActionArgs {
            description: self.config.create_description.clone(),
            inputs: Vec::new(),
            outputs: vec![ActionOutput {
                satoshis: value,
                locking_script: locking_script.clone(),
                description: RECORD_OUTPUT_DESCRIPTION.to_string(),
                basket: Some(self.config.basket.clone()),
                tags: Vec::new(),
            }],
            input_evidence: None,
            options: self.options(),
        };

        workflow.advance(WorkflowPhase::Finalizing)?;
        let result = self.service.create_action(args).await?;
        let txid = result.txid.ok_or(TaskTokenError::MissingTxid)?;
        workflow.advance(WorkflowPhase::Committed)?;

        // Outputs are not randomized, so the record is output 0.
        let record = TaskRecord {
            identity: Outpoint::new(txid, 0),
            plaintext: text.to_string(),
            value,
            locking_script,
            evidence: result.evidence.unwrap_or_default(),
        };

        Ok(CreateOutcome {
            record,
            txid,
            phases: workflow.history().to_vec(),
        })
    }

    /// Redeem `record`, returning its value to the owner.
    ///
    /// A skeleton issued by the signing service is aborted if any later
    /// step fails.
    pub async fn redeem(&mut self, record: &TaskRecord) -> Result<RedeemOutcome, TaskTokenError> {
        if self.redeemed.contains(&record.identity) {
            return Err(TaskTokenError::AlreadyRedeemed(record.identity));
        }

        let _timer = WorkflowTimer::start(WorkflowKind::Redeem.as_str());
        let mut workflow = Workflow::new(WorkflowKind::Redeem);

        match self.run_redeem(&mut workflow, record).await {
            Ok(outcome) => {
                self.redeemed.insert(record.identity);
                metric_inc!(RECORDS_REDEEMED);
                log_record_event!(
                    info,
                    "Task record redeemed",
                    record.identity,
                    value = record.value,
                    verification = outcome.verification.as_str()
                );
                Ok(outcome)
            }
            Err(e) => Err(self.fail(&mut workflow, e)),
        }
    }

    async fn run_redeem(
        &self,
        workflow: &mut Workflow,
        record: &TaskRecord,
    ) -> Result<RedeemOutcome, TaskTokenError> {
        workflow.advance(WorkflowPhase::Assembling)?;
        let verification = self.verify_evidence(record).await?;

        let unlocker = self.scripts.unlock(
            &self.context,
            SighashType::all(),
            record.value,
            record.locking_script.clone(),
        );

        let args = CreateActionArgs {
            description: self.config.redeem_description.clone(),
            inputs: vec![ActionInput {
                outpoint: record.identity,
                description: RECORD_INPUT_DESCRIPTION.to_string(),
                unlocking_script_length: unlocker.estimate_length(),
            }],
            outputs: Vec::new(),
            input_evidence: (!record.evidence.is_empty()).then(|| record.evidence.clone()),
            options: self.options(),
        };

        let result = self.service.create_action(args).await?;
        let signable = result
            .signable
            .ok_or(TaskTokenError::MissingSignableTransaction)?;
        workflow.advance(WorkflowPhase::AwaitingSignature)?;

        let reference = signable.reference.clone();
        match self
            .finalize_redeem(workflow, record, &unlocker, signable)
            .await
        {
            Ok(txid) => Ok(RedeemOutcome {
                identity: record.identity,
                txid,
                value: record.value,
                verification,
                phases: workflow.history().to_vec(),
            }),
            Err(e) => {
                if let Err(abort_err) = self.service.abort_action(&reference).await {
                    warn!(
                        reference = %reference,
                        error = %abort_err,
                        "Failed to abort signable action"
                    );
                }
                Err(e)
            }
        }
    }

    async fn finalize_redeem(
        &self,
        workflow: &mut Workflow,
        record: &TaskRecord,
        unlocker: &RecordUnlocker<W>,
        signable: SignableTransaction,
    ) -> Result<crate::domain::Hash, TaskTokenError> {
        let index = signable
            .transaction
            .input_index_of(&record.identity)
            .ok_or(TaskTokenError::InputNotFound(record.identity))?;

        let proof = unlocker.sign(&signable.transaction, index).await?;
        workflow.advance(WorkflowPhase::Finalizing)?;

        let mut spends = BTreeMap::new();
        spends.insert(index as u32, proof);
        let result = self
            .service
            .sign_action(SignActionArgs {
                reference: signable.reference,
                spends,
            })
            .await?;

        let txid = result.txid.ok_or(TaskTokenError::MissingTxid)?;
        workflow.advance(WorkflowPhase::Committed)?;
        Ok(txid)
    }

    /// Check the record's evidence according to the configured policy.
    async fn verify_evidence(
        &self,
        record: &TaskRecord,
    ) -> Result<VerificationStatus, TaskTokenError> {
        let policy = self.config.evidence_policy;
        let status = match (policy, &self.verifier) {
            (EvidencePolicy::Skip, _) => VerificationStatus::Skipped,
            (_, None) => {
                warn!(identity = %record.identity, "No chain verifier attached, evidence unchecked");
                VerificationStatus::Unavailable
            }
            (_, Some(_)) if record.evidence.is_empty() => VerificationStatus::Failed {
                reason: "record carries no evidence bundle".to_string(),
            },
            (_, Some(verifier)) => {
                match verifier
                    .verify(&record.evidence, self.config.strict_verification)
                    .await
                {
                    Ok(true) => VerificationStatus::Verified,
                    Ok(false) => VerificationStatus::Failed {
                        reason: "verifier rejected evidence bundle".to_string(),
                    },
                    Err(e) => VerificationStatus::Failed {
                        reason: e.to_string(),
                    },
                }
            }
        };

        metric_inc!(EVIDENCE_VERIFICATIONS, &[status.as_str()]);

        if let VerificationStatus::Failed { reason } = &status {
            if policy == EvidencePolicy::Enforce {
                return Err(TaskTokenError::VerificationFailed(reason.clone()));
            }
            warn!(
                identity = %record.identity,
                reason = %reason,
                "Evidence verification failed, finalizing anyway"
            );
        }

        Ok(status)
    }

    fn fail(&self, workflow: &mut Workflow, error: TaskTokenError) -> TaskTokenError {
        let phase = workflow.phase();
        workflow.fail();
        metric_inc!(WORKFLOW_FAILURES, &[workflow.kind().as_str()]);
        log_workflow_event!(
            warn,
            workflow.kind(),
            phase,
            "Workflow failed",
            error = %error
        );
        error
    }
}
