//! # Outbound Ports
//!
//! Traits for external collaborators: the signing service (key custody,
//! transaction assembly, broadcast) and the chain verifier.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::domain::{
    DerivationContext, EvidenceBundle, Hash, LockingScript, Network, Outpoint, PublicKey,
    TaskTokenError, Transaction, UnlockingScript,
};

/// Input the caller wants spent, unlocked later by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInput {
    /// Output to spend.
    pub outpoint: Outpoint,
    /// Human-readable purpose.
    pub description: String,
    /// Reserved size of the unlocking proof, used for fee estimation.
    pub unlocking_script_length: usize,
}

/// Output the caller wants created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutput {
    /// Attached value.
    pub satoshis: u64,
    /// Spending condition.
    pub locking_script: LockingScript,
    /// Human-readable purpose.
    pub description: String,
    /// Store the output is tracked under.
    pub basket: Option<String>,
    /// Free-form labels.
    pub tags: Vec<String>,
}

/// Broadcast and layout options.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOptions {
    /// Allow the service to queue the broadcast.
    pub accept_delayed_broadcast: bool,
    /// Allow the service to shuffle outputs.
    pub randomize_outputs: bool,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            accept_delayed_broadcast: true,
            randomize_outputs: false,
        }
    }
}

/// Arguments to `create_action`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateActionArgs {
    /// Human-readable purpose.
    pub description: String,
    /// Inputs the caller will unlock.
    pub inputs: Vec<ActionInput>,
    /// Outputs to create.
    pub outputs: Vec<ActionOutput>,
    /// Evidence for the caller's inputs.
    pub input_evidence: Option<EvidenceBundle>,
    /// Options.
    pub options: ActionOptions,
}

/// Transaction skeleton waiting for the caller's unlocking proofs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignableTransaction {
    /// Handle for `sign_action` / `abort_action`.
    pub reference: String,
    /// Skeleton with every input's source value and script filled where known.
    pub transaction: Transaction,
}

/// Result of `create_action`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateActionResult {
    /// Set when the transaction was finalised.
    pub txid: Option<Hash>,
    /// Evidence for the finalised transaction.
    pub evidence: Option<EvidenceBundle>,
    /// Set when caller inputs still need unlocking.
    pub signable: Option<SignableTransaction>,
}

/// Arguments to `sign_action`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignActionArgs {
    /// Reference from `SignableTransaction`.
    pub reference: String,
    /// Unlocking proofs keyed by input index.
    pub spends: BTreeMap<u32, UnlockingScript>,
}

/// Result of `sign_action`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignActionResult {
    /// Finalised transaction id.
    pub txid: Option<Hash>,
    /// Evidence for the finalised transaction.
    pub evidence: Option<EvidenceBundle>,
}

/// Arguments to `list_outputs`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListOutputsArgs {
    /// Store to list.
    pub basket: String,
    /// Return the evidence bundle covering the outputs.
    pub include_evidence: bool,
    /// Maximum outputs returned.
    pub limit: u32,
}

/// Output tracked by the signing service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletOutput {
    /// Ledger position.
    pub outpoint: Outpoint,
    /// Attached value.
    pub satoshis: u64,
    /// Spending condition, when the service returns scripts.
    pub locking_script: Option<LockingScript>,
    /// Whether the output is unspent.
    pub spendable: bool,
    /// Labels attached at creation.
    pub tags: Vec<String>,
}

/// Result of `list_outputs`, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListOutputsResult {
    /// Total outputs in the basket.
    pub total: usize,
    /// Returned outputs.
    pub outputs: Vec<WalletOutput>,
    /// Evidence for the returned outputs.
    pub evidence: Option<EvidenceBundle>,
}

/// Signing service - outbound port.
///
/// Holds the user's key material. Encryption, transaction assembly, signing
/// and broadcast happen behind this boundary.
#[async_trait]
pub trait SigningService: Send + Sync {
    /// Encrypt under the key derived for `context`.
    async fn encrypt(
        &self,
        plaintext: &[u8],
        context: &DerivationContext,
    ) -> Result<Vec<u8>, TaskTokenError>;

    /// Decrypt under the key derived for `context`.
    async fn decrypt(
        &self,
        ciphertext: &[u8],
        context: &DerivationContext,
    ) -> Result<Vec<u8>, TaskTokenError>;

    /// Public key derived for `context`.
    async fn get_public_key(&self, context: &DerivationContext)
        -> Result<PublicKey, TaskTokenError>;

    /// DER signature over `digest` with the key derived for `context`.
    async fn create_signature(
        &self,
        digest: &Hash,
        context: &DerivationContext,
    ) -> Result<Vec<u8>, TaskTokenError>;

    /// Build, sign and broadcast, or return a signable skeleton when caller
    /// inputs need unlocking.
    async fn create_action(
        &self,
        args: CreateActionArgs,
    ) -> Result<CreateActionResult, TaskTokenError>;

    /// Complete a signable skeleton with the caller's proofs.
    async fn sign_action(&self, args: SignActionArgs) -> Result<SignActionResult, TaskTokenError>;

    /// Release a pending skeleton.
    async fn abort_action(&self, reference: &str) -> Result<(), TaskTokenError>;

    /// List outputs stored in a basket.
    async fn list_outputs(&self, args: ListOutputsArgs)
        -> Result<ListOutputsResult, TaskTokenError>;

    /// Reachability probe. `ServiceUnavailable` while not authorized.
    async fn get_network(&self) -> Result<Network, TaskTokenError>;
}

/// Chain verifier - outbound port.
#[async_trait]
pub trait ChainVerifier: Send + Sync {
    /// Check that `evidence` proves its transactions.
    async fn verify(&self, evidence: &EvidenceBundle, strict: bool)
        -> Result<bool, TaskTokenError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Chain verifier with a fixed verdict.
#[derive(Debug, Default)]
pub struct MockChainVerifier {
    /// Verdict returned by `verify`.
    pub verdict: bool,
    /// Return an error instead of a verdict.
    pub should_fail: bool,
    calls: AtomicUsize,
}

impl MockChainVerifier {
    /// Verifier that accepts everything.
    pub fn accepting() -> Self {
        Self {
            verdict: true,
            ..Default::default()
        }
    }

    /// Verifier that rejects everything.
    pub fn rejecting() -> Self {
        Self::default()
    }

    /// Number of `verify` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainVerifier for MockChainVerifier {
    async fn verify(
        &self,
        _evidence: &EvidenceBundle,
        _strict: bool,
    ) -> Result<bool, TaskTokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(TaskTokenError::VerificationFailed(
                "Mock failure".to_string(),
            ));
        }
        Ok(self.verdict)
    }
}
